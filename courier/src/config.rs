//! Environment-driven configuration.
//!
//! Every key maps to a `COURIER_`-prefixed environment variable:
//!
//! | Key | Variable | Default |
//! |---|---|---|
//! | `bucket` | `COURIER_BUCKET` | required |
//! | `active_prefix` | `COURIER_ACTIVE_PREFIX` | `state` |
//! | `success_prefix` | `COURIER_SUCCESS_PREFIX` | `success` |
//! | `failed_prefix` | `COURIER_FAILED_PREFIX` | `failed` |
//! | `endpoint_url` | `COURIER_ENDPOINT_URL` | unset |
//! | `region` | `COURIER_REGION` | `us-east-1` |
//! | `api_host` | `COURIER_API_HOST` | `0.0.0.0` |
//! | `api_port` | `COURIER_API_PORT` | `8080` |
//! | `log_level` | `COURIER_LOG_LEVEL` | `info` |
//! | `batch_size` | `COURIER_BATCH_SIZE` | `64` |
//! | `recovery_skip_unreadable` | `COURIER_RECOVERY_SKIP_UNREADABLE` | `false` |

use std::str::FromStr;

use courier_store::StoreConfig;
use thiserror::Error;

/// Configuration problems are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration key: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Object store location and key layout.
    pub store: StoreConfig,
    /// Bind host for the HTTP surface.
    pub api_host: String,
    /// Bind port for the HTTP surface.
    pub api_port: u16,
    /// Default diagnostic verbosity; `RUST_LOG` overrides it.
    pub log_level: String,
    /// Max records drained per dispatch cycle.
    pub batch_size: usize,
    /// Skip undecodable active documents during recovery instead of
    /// refusing to start.
    pub recovery_skip_unreadable: bool,
}

impl Config {
    /// Load configuration from `COURIER_*` environment variables.
    ///
    /// # Errors
    /// `ConfigError::Missing` when `COURIER_BUCKET` is unset,
    /// `ConfigError::Invalid` for unparseable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| {
            std::env::var(format!("COURIER_{key}"))
                .ok()
                .filter(|value| !value.is_empty())
        })
    }

    /// Load configuration through an arbitrary key source. Tests inject a
    /// map here instead of mutating the process environment.
    ///
    /// # Errors
    /// Same contract as [`Config::from_env`].
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let bucket = lookup("BUCKET").ok_or(ConfigError::Missing("bucket"))?;
        let mut store = StoreConfig::new(bucket);

        if let Some(prefix) = lookup("ACTIVE_PREFIX") {
            store.active_prefix = prefix;
        }
        if let Some(prefix) = lookup("SUCCESS_PREFIX") {
            store.success_prefix = prefix;
        }
        if let Some(prefix) = lookup("FAILED_PREFIX") {
            store.failed_prefix = prefix;
        }
        store.endpoint_url = lookup("ENDPOINT_URL");
        if let Some(region) = lookup("REGION") {
            store.region = region;
        }

        Ok(Self {
            store,
            api_host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parse(&lookup, "API_PORT", 8080)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            batch_size: parse(&lookup, "BATCH_SIZE", 64)?,
            recovery_skip_unreadable: parse(&lookup, "RECOVERY_SKIP_UNREADABLE", false)?,
        })
    }
}

fn parse<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    lookup(key).map_or(Ok(default), |value| {
        value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value })
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn bucket_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("bucket")));
    }

    #[test]
    fn defaults_apply_when_only_the_bucket_is_set() {
        let config = Config::from_lookup(lookup(&[("BUCKET", "outbox")])).expect("valid");

        assert_eq!(config.store.bucket, "outbox");
        assert_eq!(config.store.active_prefix, "state");
        assert_eq!(config.store.region, "us-east-1");
        assert!(config.store.endpoint_url.is_none());
        assert_eq!(config.api_host, "0.0.0.0");
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.batch_size, 64);
        assert!(!config.recovery_skip_unreadable);
    }

    #[test]
    fn every_key_is_overridable() {
        let config = Config::from_lookup(lookup(&[
            ("BUCKET", "outbox"),
            ("ACTIVE_PREFIX", "pending"),
            ("SUCCESS_PREFIX", "done"),
            ("FAILED_PREFIX", "dead"),
            ("ENDPOINT_URL", "http://localhost:9000"),
            ("REGION", "eu-central-1"),
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9090"),
            ("LOG_LEVEL", "debug"),
            ("BATCH_SIZE", "16"),
            ("RECOVERY_SKIP_UNREADABLE", "true"),
        ]))
        .expect("valid");

        assert_eq!(config.store.active_prefix, "pending");
        assert_eq!(config.store.success_prefix, "done");
        assert_eq!(config.store.failed_prefix, "dead");
        assert_eq!(
            config.store.endpoint_url.as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(config.store.region, "eu-central-1");
        assert_eq!(config.api_host, "127.0.0.1");
        assert_eq!(config.api_port, 9090);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.batch_size, 16);
        assert!(config.recovery_skip_unreadable);
    }

    #[test]
    fn unparseable_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[("BUCKET", "outbox"), ("API_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "API_PORT", .. }));
    }
}
