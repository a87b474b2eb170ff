//! Background expiration sweeper
//!
//! Runs for the lifetime of the server:
//! 1. Rewrites the proxy fragment once at startup
//! 2. Deletes expired entries and rewrites the fragment when rows were removed
//! 3. Sleeps for the configured interval and repeats
//!
//! A stop request only interrupts the sleep. A sweep that has already begun
//! always runs to completion before the task exits.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::Alohomora;

/// Lifecycle state of the sweeper task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    Running,
    Stopped,
}

pub struct ExpirationSweeper {
    app: Arc<Alohomora>,
    interval: Duration,
}

impl ExpirationSweeper {
    pub fn new(app: Arc<Alohomora>, interval: Duration) -> Self {
        Self { app, interval }
    }

    /// Spawn the sweeper loop on the current tokio runtime
    pub fn start(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let state = Arc::new(RwLock::new(SweeperState::Running));
        let sweeps = Arc::new(RwLock::new(0u64));

        let task = tokio::spawn(run(
            self.app,
            self.interval,
            shutdown_rx,
            state.clone(),
            sweeps.clone(),
        ));

        SweeperHandle {
            shutdown_tx,
            state,
            sweeps,
            task,
        }
    }
}

/// Handle to a running sweeper
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    state: Arc<RwLock<SweeperState>>,
    sweeps: Arc<RwLock<u64>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn state(&self) -> SweeperState {
        *self.state.read().await
    }

    /// Number of completed sweeps
    pub async fn sweeps(&self) -> u64 {
        *self.sweeps.read().await
    }

    /// Signal the loop to stop and wait for it to exit
    pub async fn stop(self) {
        // A full channel means a stop request is already queued
        let _ = self.shutdown_tx.try_send(());

        if let Err(e) = self.task.await {
            error!("Expiration updater task failed: {}", e);
        }
    }
}

async fn run(
    app: Arc<Alohomora>,
    interval: Duration,
    mut shutdown_rx: mpsc::Receiver<()>,
    state: Arc<RwLock<SweeperState>>,
    sweeps: Arc<RwLock<u64>>,
) {
    info!(
        "Expiration updater started (interval {}s)",
        interval.as_secs()
    );

    if let Err(e) = app.refresh() {
        error!("Initial configuration render failed: {}", e);
    }

    loop {
        match app.sweep(Utc::now().timestamp()) {
            Ok(removed) => debug!("Sweep finished, {} expired entries removed", removed),
            Err(e) => error!("Sweep failed: {}", e),
        }
        *sweeps.write().await += 1;

        tokio::select! {
            biased;

            // Also fires when every handle has been dropped
            _ = shutdown_rx.recv() => {
                break;
            }

            _ = tokio::time::sleep(interval) => {}
        }
    }

    *state.write().await = SweeperState::Stopped;
    info!("Expiration updater is down");
}
