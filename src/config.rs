//! Service configuration
//!
//! Read from a TOML file (default `~/.config/tariff-mirror/config.toml`).
//! Every section is optional. Secrets may instead come from the
//! environment, which takes precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::services::{ExportConfig, SchedulerConfig};
use crate::infrastructure::{DatabaseConfig, GoogleSheetsConfig, WildberriesConfig};
use crate::shared::RetryConfig;

pub const CONFIG_PATH_ENV: &str = "TARIFF_MIRROR_CONFIG";
pub const API_KEY_ENV: &str = "WILDBERRIES_API_KEY";
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_SHEETS_ACCESS_TOKEN";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub source: WildberriesConfig,
    pub sheets: GoogleSheetsConfig,
    pub scheduler: SchedulerConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error, or any `EnvFilter` directive
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Prometheus scrape address
    pub listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "0.0.0.0:9100".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path` and apply environment overrides. A missing file
    /// yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml_str(&raw)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?).map_err(io_err)
    }

    /// Write a default configuration to `path`. An existing
    /// file is only replaced when `overwrite` is set.
    pub fn write_default(path: &Path, overwrite: bool) -> Result<(), ConfigError> {
        if path.exists() && !overwrite {
            return Err(ConfigError::Invalid(format!(
                "{} already exists (use --force to replace it)",
                path.display()
            )));
        }
        Self::default().save(path)
    }

    /// Overwrite secrets with non-empty values from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_ENV) {
            self.source.api_key = key;
        }
        if let Some(token) = non_empty(ACCESS_TOKEN_ENV) {
            self.sheets.access_token = token;
        }
        if let Some(url) = non_empty(DATABASE_URL_ENV) {
            self.database.url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.database.url.trim().is_empty() {
            return invalid("database.url must not be empty");
        }
        if !(1..=1440).contains(&self.scheduler.interval_minutes) {
            return invalid("scheduler.interval_minutes must be between 1 and 1440");
        }
        if self.sheets.sheet_name.trim().is_empty() {
            return invalid("sheets.sheet_name must not be empty");
        }
        if self.sheets.destination_timeout_secs == 0 {
            return invalid("sheets.destination_timeout_secs must be positive");
        }
        if self.source.retry_attempts == 0 {
            return invalid("source.retry_attempts must be at least 1");
        }
        if !matches!(self.logging.format.to_lowercase().as_str(), "json" | "pretty") {
            return invalid("logging.format must be \"json\" or \"pretty\"");
        }
        if self.metrics.enabled && self.metrics.listen.parse::<std::net::SocketAddr>().is_err() {
            return invalid("metrics.listen must be a socket address");
        }
        Ok(())
    }

    pub fn export_config(&self) -> ExportConfig {
        ExportConfig {
            sheet_name: self.sheets.sheet_name.clone(),
            destination_timeout: Duration::from_secs(self.sheets.destination_timeout_secs),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.source.retry_attempts,
            ..RetryConfig::default()
        }
    }
}

/// `~/.config/tariff-mirror/config.toml`, or `./config.toml` without a
/// home directory.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .map(|dir| dir.join("tariff-mirror").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.scheduler.interval_minutes, 60);
        assert!(!config.scheduler.run_on_start);
        assert_eq!(config.sheets.sheet_name, "stock_coefs");
        assert_eq!(config.sheets.destination_timeout_secs, 120);
        assert_eq!(config.logging.level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [scheduler]
            run_on_start = true

            [sheets]
            seed_destinations = ["1AbC-d_e"]

            [database]
            url = "postgres://mirror@localhost/tariffs"
            "#,
        )
        .unwrap();

        assert!(config.scheduler.run_on_start);
        assert_eq!(config.scheduler.interval_minutes, 60);
        assert_eq!(config.sheets.seed_destinations, vec!["1AbC-d_e"]);
        assert_eq!(config.sheets.sheet_name, "stock_coefs");
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn environment_overrides_secrets() {
        let mut config = AppConfig::from_toml_str(
            r#"
            [source]
            api_key = "from-file"
            "#,
        )
        .unwrap();

        config.apply_overrides(|key| match key {
            API_KEY_ENV => Some("from-env".to_string()),
            ACCESS_TOKEN_ENV => Some("ya29.token".to_string()),
            DATABASE_URL_ENV => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.source.api_key, "from-env");
        assert_eq!(config.sheets.access_token, "ya29.token");
        assert_eq!(config.database.url, DatabaseConfig::default().url);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = AppConfig::default();
        config.scheduler.interval_minutes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.metrics.enabled = true;
        config.metrics.listen = "nowhere".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_toml_is_a_parse_error() {
        assert!(matches!(
            AppConfig::from_toml_str("[scheduler]\ninterval_minutes = \"hourly\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir()
            .join(format!("tariff-mirror-{}", uuid::Uuid::new_v4()))
            .join("config.toml");
        let mut config = AppConfig::default();
        config.scheduler.interval_minutes = 30;
        config.sheets.seed_destinations = vec!["sheet-1".into()];

        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();

        assert_eq!(loaded.scheduler.interval_minutes, 30);
        assert_eq!(loaded.sheets.seed_destinations, vec!["sheet-1"]);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn write_default_keeps_existing_file_unless_forced() {
        let path = std::env::temp_dir()
            .join(format!("tariff-mirror-{}", uuid::Uuid::new_v4()))
            .join("config.toml");

        AppConfig::write_default(&path, false).unwrap();
        let written = AppConfig::from_toml_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.scheduler.interval_minutes, 60);
        assert_eq!(written.sheets.sheet_name, "stock_coefs");
        assert!(written.source.api_key.is_empty());

        std::fs::write(&path, "[scheduler]\ninterval_minutes = 15\n").unwrap();
        assert!(matches!(
            AppConfig::write_default(&path, false),
            Err(ConfigError::Invalid(_))
        ));
        assert_eq!(AppConfig::load(&path).unwrap().scheduler.interval_minutes, 15);

        AppConfig::write_default(&path, true).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap().scheduler.interval_minutes, 60);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("absent-{}.toml", uuid::Uuid::new_v4()));
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.scheduler.interval_minutes, 60);
    }

    #[test]
    fn export_and_retry_settings_follow_config() {
        let mut config = AppConfig::default();
        config.sheets.destination_timeout_secs = 5;
        config.source.retry_attempts = 4;
        assert_eq!(config.export_config().destination_timeout, Duration::from_secs(5));
        assert_eq!(config.retry_config().max_attempts, 4);
    }
}
