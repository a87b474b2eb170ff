use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub sweeper: SweeperConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or fall back to defaults
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/alohomora/config.toml"),
            dirs_next::config_dir()
                .map(|p| p.join("alohomora/config.toml"))
                .unwrap_or_default(),
            PathBuf::from("config.toml"),
        ];

        for path in &paths {
            if path.is_file() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Apply `ALOHOMORA_*` environment overrides on top of the file values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(listen) = std::env::var("ALOHOMORA_LISTEN") {
            self.http.listen = listen;
        }
        if let Ok(db) = std::env::var("ALOHOMORA_DB") {
            self.general.db_path = db;
        }
        if let Ok(conf) = std::env::var("ALOHOMORA_ALLOW_CONF") {
            self.general.allow_conf_path = conf;
        }
        if let Ok(secs) = std::env::var("ALOHOMORA_SWEEP_INTERVAL") {
            self.sweeper.interval_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid ALOHOMORA_SWEEP_INTERVAL: {}", secs))?;
        }
        Ok(())
    }

    /// Get the database path
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.general.db_path)
    }

    /// Get the generated allow.conf path
    pub fn allow_conf_path(&self) -> PathBuf {
        PathBuf::from(&self.general.allow_conf_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Path to SQLite database
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Path of the generated proxy fragment
    #[serde(default = "default_allow_conf_path")]
    pub allow_conf_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            allow_conf_path: default_allow_conf_path(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Seconds between two expiration sweeps
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address the web interface listens on
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory served under /static
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl HttpConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            static_dir: default_static_dir(),
            session_ttl_secs: default_session_ttl(),
            cookie_name: default_cookie_name(),
        }
    }
}

// Default value functions
fn default_db_path() -> String {
    "data/alohomora.sqlite".to_string()
}

fn default_allow_conf_path() -> String {
    "data/allow.conf".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sweep_interval() -> u64 {
    600 // 10 minutes
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_session_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_cookie_name() -> String {
    "alohomora_session".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.db_path(), PathBuf::from("data/alohomora.sqlite"));
        assert_eq!(config.allow_conf_path(), PathBuf::from("data/allow.conf"));
        assert_eq!(config.sweeper.interval(), Duration::from_secs(600));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.general.db_path, config.general.db_path);
        assert_eq!(parsed.http.listen, config.http.listen);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[sweeper]\ninterval_secs = 30\n").unwrap();
        assert_eq!(parsed.sweeper.interval_secs, 30);
        assert_eq!(parsed.general.allow_conf_path, "data/allow.conf");
        assert_eq!(parsed.http.cookie_name, "alohomora_session");
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let sweeper = SweeperConfig { interval_secs: 0 };
        assert_eq!(sweeper.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.general.allow_conf_path = "/etc/nginx/allow.conf".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.general.allow_conf_path, "/etc/nginx/allow.conf");
    }
}
