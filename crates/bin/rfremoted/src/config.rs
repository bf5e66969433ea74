//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `rfremote.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

use rfremote_adapter_ble::BleConfig;
use rfremote_app::router::RouterConfig;
use rfremote_app::session::SessionConfig;

/// Largest accepted rapid send burst.
const MAX_RAPID_SEND_COUNT: u32 = 100;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection session tuning.
    pub session: SessionConfig,
    /// Notification router tuning.
    pub router: RouterConfig,
    /// BLE radio and GATT identifiers.
    pub ble: BleConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `rfremote.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("rfremote.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Apply overrides read through `lookup`. Unparsable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("RFREMOTE_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = lookup("RFREMOTE_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RFREMOTE_AUTO_RECONNECT")
            && let Some(enabled) = parse_flag(&val)
        {
            self.session.auto_reconnect = enabled;
        }
        if let Some(val) = lookup("RFREMOTE_SCAN_WINDOW_SECS")
            && let Ok(secs) = val.parse()
        {
            self.session.scan_window_secs = secs;
        }
        if let Some(val) = lookup("RFREMOTE_RAPID_SEND_COUNT")
            && let Ok(count) = val.parse()
        {
            self.session.rapid_send_count = count;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.scan_window_secs == 0 {
            return Err(ConfigError::Validation(
                "scan_window_secs must be non-zero".to_string(),
            ));
        }
        if !(1..=MAX_RAPID_SEND_COUNT).contains(&self.session.rapid_send_count) {
            return Err(ConfigError::Validation(format!(
                "rapid_send_count must be between 1 and {MAX_RAPID_SEND_COUNT}"
            )));
        }
        if self.session.command_queue == 0 {
            return Err(ConfigError::Validation(
                "command_queue must be non-zero".to_string(),
            ));
        }
        if self.router.telemetry_capacity == 0 || self.router.event_capacity == 0 {
            return Err(ConfigError::Validation(
                "router capacities must be non-zero".to_string(),
            ));
        }
        if self.ble.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "connect_timeout_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:rfremote.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "rfremoted=info,rfremote=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.session.scan_window_secs, 5);
        assert!(config.session.auto_reconnect);
        assert_eq!(config.session.rapid_send_count, 10);
        assert_eq!(config.router.telemetry_capacity, 50);
        assert_eq!(config.ble.connect_timeout_secs, 10);
        assert_eq!(config.database.url, "sqlite:rfremote.db?mode=rwc");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.session.scan_window_secs, 5);
        assert!(config.ble.require_name);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [session]
            scan_window_secs = 8
            auto_reconnect = false
            rapid_send_count = 4
            command_queue = 8
            restore_on_start = false

            [router]
            telemetry_capacity = 20
            event_capacity = 16

            [ble]
            service_uuid = '12345678-1234-1234-1234-1234567890ff'
            connect_timeout_secs = 3
            require_name = false
            name_filter = 'remote'

            [database]
            url = 'sqlite:test.db'

            [logging]
            filter = 'debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.session.scan_window_secs, 8);
        assert!(!config.session.auto_reconnect);
        assert_eq!(config.session.rapid_send_count, 4);
        assert_eq!(config.session.command_queue, 8);
        assert!(!config.session.restore_on_start);
        assert_eq!(config.router.telemetry_capacity, 20);
        assert_eq!(config.router.event_capacity, 16);
        assert_eq!(
            config.ble.service_uuid.to_string(),
            "12345678-1234-1234-1234-1234567890ff"
        );
        assert_eq!(config.ble.connect_timeout_secs, 3);
        assert!(!config.ble.require_name);
        assert_eq!(config.ble.name_filter.as_deref(), Some("remote"));
        assert_eq!(config.database_url(), "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [session]
            rapid_send_count = 3
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.session.rapid_send_count, 3);
        assert_eq!(config.session.scan_window_secs, 5);
        assert_eq!(config.database.url, "sqlite:rfremote.db?mode=rwc");
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.session.scan_window_secs, 5);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_apply_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("RFREMOTE_DATABASE_URL", "sqlite::memory:"),
            ("RFREMOTE_LOG", "trace"),
            ("RFREMOTE_AUTO_RECONNECT", "off"),
            ("RFREMOTE_SCAN_WINDOW_SECS", "12"),
            ("RFREMOTE_RAPID_SEND_COUNT", "25"),
        ]));
        assert_eq!(config.database_url(), "sqlite::memory:");
        assert_eq!(config.logging.filter, "trace");
        assert!(!config.session.auto_reconnect);
        assert_eq!(config.session.scan_window_secs, 12);
        assert_eq!(config.session.rapid_send_count, 25);
    }

    #[test]
    fn should_prefer_rust_log_over_rfremote_log() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("RFREMOTE_LOG", "info"), ("RUST_LOG", "debug")]));
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_ignore_unparsable_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("RFREMOTE_AUTO_RECONNECT", "maybe"),
            ("RFREMOTE_SCAN_WINDOW_SECS", "soon"),
        ]));
        assert!(config.session.auto_reconnect);
        assert_eq!(config.session.scan_window_secs, 5);
    }

    #[test]
    fn should_reject_zero_scan_window() {
        let mut config = Config::default();
        config.session.scan_window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_rapid_count_out_of_range() {
        let mut config = Config::default();
        config.session.rapid_send_count = 0;
        assert!(config.validate().is_err());
        config.session.rapid_send_count = 101;
        assert!(config.validate().is_err());
        config.session.rapid_send_count = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_reject_zero_capacities() {
        let mut config = Config::default();
        config.router.event_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.command_queue = 0;
        assert!(config.validate().is_err());
    }
}
