// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Period of the tick loop. One tick adds one second to the counter.
    pub tick_interval_ms: u64,
    /// Upper bound on a single Time Store call.
    pub remote_timeout_ms: u64,
    /// Failed saves/deletes are retried this many times before being reverted.
    pub max_sync_attempts: u32,
    pub reconcile_interval_secs: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            remote_timeout_ms: 5_000,
            max_sync_attempts: 3,
            reconcile_interval_secs: 30,
        }
    }
}

impl TimerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
    /// Bearer token required on `/api/v1` routes. `None` disables auth.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 7878,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub timezone: String,
    pub product_id: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Paris".into(),
            product_id: "-//tasktrack//calendar//EN".into(),
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.timer.tick_interval_ms, 1_000);
        assert_eq!(c.timer.remote_timeout_ms, 5_000);
        assert_eq!(c.timer.max_sync_attempts, 3);
        assert_eq!(c.api.port, 7878);
        assert!(c.api.token.is_none());
        assert_eq!(c.calendar.timezone, "Europe/Paris");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.timer.reconcile_interval_secs, 30);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[timer]
tick_interval_ms = 500
remote_timeout_ms = 2000
max_sync_attempts = 5
reconcile_interval_secs = 10

[api]
port = 9000
token = "s3cret"

[calendar]
timezone = "UTC"
product_id = "-//test//EN"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.timer.tick_interval(), Duration::from_millis(500));
        assert_eq!(config.timer.remote_timeout(), Duration::from_secs(2));
        assert_eq!(config.timer.max_sync_attempts, 5);
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.token.as_deref(), Some("s3cret"));
        assert_eq!(config.calendar.timezone, "UTC");
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: Config = toml::from_str("[timer]\nmax_sync_attempts = 1\n").unwrap();
        assert_eq!(config.timer.max_sync_attempts, 1);
        assert_eq!(config.timer.tick_interval_ms, 1_000);
    }

    #[test]
    fn test_zero_intervals_clamped() {
        let t = TimerConfig {
            tick_interval_ms: 0,
            reconcile_interval_secs: 0,
            ..TimerConfig::default()
        };
        assert_eq!(t.tick_interval(), Duration::from_millis(1));
        assert_eq!(t.reconcile_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.api.port, config.api.port);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }
}
