// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::AppError;
use crate::tenants::{Account, InMemoryTenantDirectory};

/// Default configuration file, read when present
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
/// Prefix of environment overrides, e.g. `ROLLCALL_BIND_ADDR`
pub const ENV_PREFIX: &str = "ROLLCALL_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// TCP bind address, unused when `unix_socket` is set
    pub bind_addr: SocketAddr,
    /// Listen on this Unix socket instead of TCP
    pub unix_socket: Option<PathBuf>,
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Viewer subscriptions silent for longer than this are dropped
    pub liveness_window_secs: u64,
    /// Meetings idle for longer than this are swept
    pub retention_window_secs: u64,
    pub sweep_interval_secs: u64,
    /// Capacity of each viewer's outbound queue
    pub subscriber_queue: usize,
    /// Accepted `Origin` headers on `/ws`; empty accepts any
    pub allowed_origins: Vec<String>,
    pub accounts: Vec<Account>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            unix_socket: None,
            log_level: "info".to_string(),
            log_json: false,
            liveness_window_secs: 60,
            retention_window_secs: 6 * 60 * 60,
            sweep_interval_secs: 60 * 60,
            subscriber_queue: 32,
            allowed_origins: Vec::new(),
            accounts: Vec::new(),
        }
    }
}

impl Settings {
    /// Load from `config.toml` in the working directory and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from an explicit file (which must exist) or the default one,
    /// then apply `ROLLCALL_*` environment overrides and validate.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                if !path.is_file() {
                    bail!("configuration file {} does not exist", path.display());
                }
                path.to_path_buf()
            },
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let settings: Settings = Figment::new()
            .merge(Toml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .with_context(|| format!("failed to read configuration from {}", file.display()))?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(AppError::Config(format!("unknown log level {:?}", self.log_level)));
        }
        if self.liveness_window_secs == 0 {
            return Err(AppError::Config("liveness_window_secs must be positive".to_string()));
        }
        if self.retention_window_secs == 0 {
            return Err(AppError::Config("retention_window_secs must be positive".to_string()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(AppError::Config("sweep_interval_secs must be positive".to_string()));
        }
        if self.subscriber_queue == 0 {
            return Err(AppError::Config("subscriber_queue must be positive".to_string()));
        }

        InMemoryTenantDirectory::from_accounts(&self.accounts).map_err(|e| AppError::Config(e.to_string()))?;
        Ok(())
    }

    pub fn liveness_window(&self) -> Duration {
        Duration::from_secs(self.liveness_window_secs)
    }

    pub fn retention_window(&self) -> Duration {
        Duration::from_secs(self.retention_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Whether a WebSocket handshake from `origin` may proceed
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        origin.is_some_and(|origin| self.allowed_origins.iter().any(|allowed| allowed == origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn account(id: &str, password: &str) -> Account {
        Account::new(id, "secret-token-long-enough", password)
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(settings.liveness_window(), Duration::from_secs(60));
        assert_eq!(settings.retention_window(), Duration::from_secs(21600));
        assert_eq!(settings.sweep_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_settings_validation() {
        let settings = Settings::default();

        let mut invalid = settings.clone();
        invalid.log_level = "loud".to_string();
        assert!(matches!(invalid.validate(), Err(AppError::Config(_))));

        let mut invalid = settings.clone();
        invalid.liveness_window_secs = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = settings.clone();
        invalid.sweep_interval_secs = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = settings.clone();
        invalid.subscriber_queue = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = settings.clone();
        invalid.accounts = vec![account("T1", "short")];
        assert!(invalid.validate().is_err());

        let mut invalid = settings;
        invalid.accounts = vec![account("T1", "viewer-password-one"), account("T2", "viewer-password-one")];
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_origin_allow_list() {
        let mut settings = Settings::default();
        assert!(settings.origin_allowed(None));
        assert!(settings.origin_allowed(Some("https://anywhere.example")));

        settings.allowed_origins = vec!["http://localhost:8080".to_string()];
        assert!(settings.origin_allowed(Some("http://localhost:8080")));
        assert!(!settings.origin_allowed(Some("https://evil.example")));
        assert!(!settings.origin_allowed(None));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
bind_addr = "0.0.0.0:9000"
log_level = "debug"
allowed_origins = ["http://localhost:8080"]

[[accounts]]
account_id = "T1"
secret_token = "secret-token-long-enough"
viewer_password = "viewer-password-one"
"#
        )
        .unwrap();

        let settings = Settings::load_from(Some(file.path())).unwrap();
        assert_eq!(settings.bind_addr.port(), 9000);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.accounts, vec![account("T1", "viewer-password-one")]);
        assert_eq!(settings.retention_window_secs, 21600);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load_from(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "subscriber_queue = 0").unwrap();

        assert!(Settings::load_from(Some(file.path())).is_err());
    }
}
