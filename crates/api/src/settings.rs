//! Service settings
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `MONITOR__<SECTION>__<KEY>` environment variables.

use alerting::TrackerConfig;
use config::{Config, ConfigError, Environment, File, FileFormat};
use monitor_scheduler::MonitorConfig;
use serde::Deserialize;
use std::time::Duration;

/// Settings file used when `MONITOR_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "threshold-monitor.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub monitor: MonitorSettings,
    pub tracker: TrackerConfig,
    pub database: DatabaseSettings,
    pub server: ServerSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub tick_interval_secs: u64,
    pub call_timeout_ms: u64,
    /// Start periodic sweeps on boot
    pub autostart: bool,
}

impl MonitorSettings {
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            tick_interval_secs: self.tick_interval_secs,
            call_timeout_ms: self.call_timeout_ms,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.monitor_config().tick_interval()
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        let defaults = MonitorConfig::default();
        Self {
            tick_interval_secs: defaults.tick_interval_secs,
            call_timeout_ms: defaults.call_timeout_ms,
            autostart: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://threshold-monitor.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Settings {
    /// Load from `MONITOR_CONFIG` (or the default path) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("MONITOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load from a specific file; a missing file falls back to defaults
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("MONITOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = Settings::load_from("/nonexistent/threshold-monitor.toml").unwrap();
        assert_eq!(settings.monitor.tick_interval(), Duration::from_secs(60));
        assert!(settings.monitor.autostart);
        assert_eq!(settings.database.max_connections, 5);
        assert_eq!(settings.server.bind, "0.0.0.0:8080");
        assert!(!settings.log.json);
    }

    #[test]
    fn test_file_overrides() {
        let path = std::env::temp_dir().join(format!(
            "threshold-monitor-settings-{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"
[monitor]
tick_interval_secs = 15
autostart = false

[tracker]
re_alert_delta = 2.5

[log]
json = true
"#,
        )
        .unwrap();

        let settings = Settings::load_from(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.monitor.tick_interval_secs, 15);
        assert_eq!(settings.monitor.call_timeout_ms, 5_000);
        assert!(!settings.monitor.autostart);
        assert_eq!(settings.tracker.re_alert_delta, 2.5);
        assert_eq!(settings.tracker.re_alert_cooldown_secs, 3600);
        assert!(settings.log.json);
    }
}
