pub mod auth;
pub mod config;
pub mod database;
pub mod duration;
pub mod error;
pub mod models;
pub mod render;
pub mod sweeper;
pub mod validation;
pub mod web;

use chrono::Utc;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

use config::Config;
use database::WhitelistStore;
use error::Result;
use models::Entry;

/// Core alohomora instance: the store plus the generated proxy fragment
/// that mirrors it.
pub struct Alohomora {
    config: Config,
    store: WhitelistStore,
    allow_conf: PathBuf,
    /// Serializes list + render + write so the file on disk always reflects
    /// the most recent store state.
    render_lock: Mutex<()>,
    /// Set when the last rewrite failed and the file lags behind the store
    stale: AtomicBool,
}

impl Alohomora {
    /// Create a new instance from configuration
    pub fn new(config: Config) -> Result<Self> {
        let store = WhitelistStore::open(config.db_path())?;
        Ok(Self::with_store(config, store))
    }

    /// Create instance around an already opened store
    pub fn with_store(config: Config, store: WhitelistStore) -> Self {
        let allow_conf = config.allow_conf_path();
        Self {
            config,
            store,
            allow_conf,
            render_lock: Mutex::new(()),
            stale: AtomicBool::new(false),
        }
    }

    /// Add an entry and rewrite the proxy fragment.
    ///
    /// `ip` and `label` must already be validated and sanitized. The row is
    /// only committed once the new fragment is in place, so a failed add
    /// leaves neither the store nor the file changed.
    pub fn add(&self, ip: &str, label: &str, expiration: i64) -> Result<i64> {
        let _guard = self.render_lock.lock();

        let mut published = false;
        let result = self.store.insert_published(ip, label, expiration, |entries| {
            self.publish(entries)?;
            published = true;
            Ok(())
        });

        match result {
            Ok(id) => {
                info!("Added {} ({}) '{}'", ip, expiration, label);
                Ok(id)
            }
            Err(e) => {
                error!("Failed to add {}: {}", ip, e);
                if published {
                    self.restore_locked();
                }
                Err(e)
            }
        }
    }

    /// Remove an entry and rewrite the proxy fragment.
    ///
    /// Returns false, without touching anything, when the id is unknown.
    /// The deletion is only committed once the new fragment is in place.
    pub fn remove(&self, id: i64) -> Result<bool> {
        let _guard = self.render_lock.lock();

        let mut published = false;
        let result = self.store.delete_published(id, |entries| {
            self.publish(entries)?;
            published = true;
            Ok(())
        });

        match result {
            Ok(true) => {
                info!("Deleted #{}", id);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                error!("Failed to delete #{}: {}", id, e);
                if published {
                    self.restore_locked();
                }
                Err(e)
            }
        }
    }

    /// All entries in insertion order
    pub fn list(&self) -> Result<Vec<Entry>> {
        self.store.list()
    }

    /// Render the current store contents
    pub fn render(&self) -> Result<String> {
        render::render(&self.store.list()?)
    }

    /// Rewrite the proxy fragment from the current store contents
    pub fn refresh(&self) -> Result<()> {
        let _guard = self.render_lock.lock();
        self.write_conf_locked()
    }

    /// Drop entries expired as of `now` and rewrite the fragment if any
    /// were removed (or if an earlier rewrite failed). Returns the number
    /// of removed entries.
    pub fn sweep(&self, now: i64) -> Result<usize> {
        let removed = self.store.delete_expired(now)?;

        if removed > 0 {
            info!(
                "Cleaned ({} row{})",
                removed,
                if removed > 1 { "s" } else { "" }
            );
        }

        if removed > 0 || self.stale.load(Ordering::SeqCst) {
            self.refresh()?;
        }

        Ok(removed)
    }

    /// Sweep at the current wall-clock time
    pub fn sweep_now(&self) -> Result<usize> {
        self.sweep(Utc::now().timestamp())
    }

    /// Whether the fragment on disk is known to lag behind the store
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &WhitelistStore {
        &self.store
    }

    pub fn allow_conf_path(&self) -> &Path {
        &self.allow_conf
    }

    /// Get configuration reference
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn write_conf_locked(&self) -> Result<()> {
        let result = self
            .store
            .list()
            .and_then(|entries| self.publish(&entries));

        if result.is_err() {
            self.stale.store(true, Ordering::SeqCst);
        }
        result
    }

    /// Render `entries` and replace the fragment on disk
    fn publish(&self, entries: &[Entry]) -> Result<()> {
        let written = render::render(entries)
            .and_then(|text| render::write_atomic(&self.allow_conf, &text));

        if let Err(e) = written {
            warn!("Could not update '{}': {}", self.allow_conf.display(), e);
            return Err(e);
        }

        self.stale.store(false, Ordering::SeqCst);
        info!("Update configuration file '{}'", self.allow_conf.display());
        Ok(())
    }

    /// Bring the fragment back in line with the committed store after a
    /// commit failed behind an already published file
    fn restore_locked(&self) {
        if let Err(e) = self.write_conf_locked() {
            error!("Failed to restore {}: {}", self.allow_conf.display(), e);
        }
    }
}
