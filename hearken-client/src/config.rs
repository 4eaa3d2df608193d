//! Configuration loading for the Hearken client.
//!
//! Top-level fields are required. The `[cache]` and `[telemetry]` tables may
//! be omitted and fall back to their defaults.

use hearken_cache::{CacheConfig, Resource};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    /// Route of the sign-in entry point, e.g. `/sign-in`.
    pub sign_in_path: String,
    /// Delay between a 401 and the redirect to sign-in.
    pub redirect_delay_ms: u64,
    /// JSON file holding the durable session.
    pub session_path: PathBuf,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// Overrides every resource's own stale time when set.
    #[serde(default)]
    pub stale_time_ms: Option<u64>,
    #[serde(default = "default_gc_time_ms")]
    pub gc_time_ms: u64,
    /// Keyed by resource name (`inputs-list`, `topic-detail`, ...).
    #[serde(default)]
    pub stale_overrides: BTreeMap<String, u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            stale_time_ms: None,
            gc_time_ms: default_gc_time_ms(),
            stale_overrides: BTreeMap::new(),
        }
    }
}

fn default_gc_time_ms() -> u64 {
    300_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Default filter directive when neither `HEARKEN_LOG` nor `RUST_LOG`
    /// is set.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or HEARKEN_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.api_base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if !self.sign_in_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "sign_in_path",
                reason: "must start with '/'".to_string(),
            });
        }
        if self.session_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "session_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cache.gc_time_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.gc_time_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if let Some(stale) = self.cache.stale_time_ms {
            if self.cache.gc_time_ms < stale {
                return Err(ConfigError::InvalidValue {
                    field: "cache.gc_time_ms",
                    reason: "must be >= stale_time_ms".to_string(),
                });
            }
        }
        for name in self.cache.stale_overrides.keys() {
            if Resource::from_name(name).is_err() {
                return Err(ConfigError::InvalidValue {
                    field: "cache.stale_overrides",
                    reason: format!("unknown resource '{}'", name),
                });
            }
        }
        if self.telemetry.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "telemetry.level",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    /// Lower the `[cache]` table into the cache crate's config.
    pub fn cache_config(&self) -> Result<CacheConfig, ConfigError> {
        let mut config =
            CacheConfig::new().with_gc_time(Duration::from_millis(self.cache.gc_time_ms));
        if let Some(stale) = self.cache.stale_time_ms {
            config = config.with_stale_time(Duration::from_millis(stale));
        }
        for (name, ms) in &self.cache.stale_overrides {
            let resource = Resource::from_name(name).map_err(|err| ConfigError::InvalidValue {
                field: "cache.stale_overrides",
                reason: err.to_string(),
            })?;
            config = config.with_stale_override(resource, Duration::from_millis(*ms));
        }
        Ok(config)
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("HEARKEN_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
api_base_url = "https://feedback.example.edu/api/"
request_timeout_ms = 15000
sign_in_path = "/sign-in"
redirect_delay_ms = 1500
session_path = "/tmp/hearken/session.json"

[cache]
stale_time_ms = 30000
gc_time_ms = 600000

[cache.stale_overrides]
input-stats = 120000

[telemetry]
level = "debug"
json = true
"#;

    fn parse(contents: &str) -> ClientConfig {
        ClientConfig::from_toml_str(contents).unwrap()
    }

    #[test]
    fn test_valid_config_passes() {
        let config = parse(VALID);
        config.validate().unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert!(config.telemetry.json);

        let cache = config.cache_config().unwrap();
        assert_eq!(cache.gc_time, Duration::from_secs(600));
        assert_eq!(
            cache.stale_time_for(Resource::InputStats),
            Duration::from_secs(120)
        );
        assert_eq!(
            cache.stale_time_for(Resource::InputsList),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_optional_tables_default() {
        let config = parse(
            r#"
api_base_url = "http://localhost:4000"
request_timeout_ms = 1000
sign_in_path = "/login"
redirect_delay_ms = 0
session_path = "session.json"
"#,
        );
        config.validate().unwrap();
        assert_eq!(config.cache.gc_time_ms, 300_000);
        assert_eq!(config.telemetry.level, "info");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = ClientConfig::from_toml_str(&format!("{}\nretries = 3\n", VALID)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_rejects_bad_values() {
        let cases: [(&str, &str, &str); 5] = [
            (
                "api_base_url = \"https://feedback.example.edu/api/\"",
                "api_base_url = \"ftp://x\"",
                "api_base_url",
            ),
            ("request_timeout_ms = 15000", "request_timeout_ms = 0", "request_timeout_ms"),
            ("sign_in_path = \"/sign-in\"", "sign_in_path = \"sign-in\"", "sign_in_path"),
            ("gc_time_ms = 600000", "gc_time_ms = 1000", "cache.gc_time_ms"),
            ("input-stats = 120000", "input-statistics = 120000", "cache.stale_overrides"),
        ];
        for (from, to, expected) in cases {
            let config = parse(&VALID.replace(from, to));
            match config.validate() {
                Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected {} to be rejected, got {:?}", expected, other),
            }
        }
    }
}
