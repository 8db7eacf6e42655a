//! # Runtime configuration.
//!
//! Provides [`Config`], the centralized settings for one pipeline instance and
//! the edge dispatcher.
//!
//! Config is used in three ways:
//! 1. **Pipeline creation**: `Pipeline::builder(config)`
//! 2. **Dispatcher creation**: `Dispatcher::new(config.dispatcher)`
//! 3. **Binary bootstrap**: `Config::load(path)` from a TOML file
//!
//! ## Sentinel values
//! - `grace_ms = 0` → do not wait for in-flight work on shutdown
//! - `decrease_ratio` outside `(0, 1)` → treated as `0.7`
//! - `bus_capacity = 0` → clamped to 1
//!
//! ## Example
//! ```rust
//! use seatvisor::Config;
//!
//! let cfg = Config::from_toml_str(r#"
//!     grace_ms = 5000
//!
//!     [adaptive]
//!     min_concurrent = 10
//!     max_concurrent = 64
//!
//!     [dispatcher]
//!     servers = ["http://10.0.0.1:8081", "http://10.0.0.2:8081"]
//! "#).unwrap();
//!
//! assert_eq!(cfg.adaptive.initial_limit(), 10);
//! assert_eq!(cfg.adaptive.target_latency_ms, 250); // default kept
//! assert_eq!(cfg.dispatcher.servers.len(), 2);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Decrease ratio used whenever the configured one is outside `(0, 1)`.
pub const FALLBACK_DECREASE_RATIO: f64 = 0.7;

/// Global configuration for a seatvisor process.
///
/// ## Field semantics
/// - `adaptive`: knobs of the adaptive concurrency limiter
/// - `dispatcher`: backend targets and proxy limits for the edge
/// - `grace_ms`: maximum wait for in-flight requests on shutdown (`0` = no wait)
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Adaptive limiter settings.
    pub adaptive: AdaptiveConfig,
    /// Edge dispatcher settings.
    pub dispatcher: DispatcherConfig,
    /// Maximum time to wait for in-flight requests during shutdown, in milliseconds.
    pub grace_ms: u64,
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` messages skip
    /// older items.
    pub bus_capacity: usize,
}

impl Config {
    /// Parses a TOML document and validates it.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.adaptive.validate()?;
        self.dispatcher.validate()
    }

    /// Returns the shutdown grace period as an `Option`.
    ///
    /// - `None` → do not wait
    /// - `Some(d)` → wait up to `d`
    #[inline]
    pub fn grace(&self) -> Option<Duration> {
        match self.grace_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `adaptive = AdaptiveConfig::default()`
    /// - `dispatcher = DispatcherConfig::default()`
    /// - `grace_ms = 30000`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            adaptive: AdaptiveConfig::default(),
            dispatcher: DispatcherConfig::default(),
            grace_ms: 30_000,
            bus_capacity: 1024,
        }
    }
}

/// Settings of the AIMD concurrency limiter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Floor of the adaptive limit.
    pub min_concurrent: usize,
    /// Ceiling of the adaptive limit.
    pub max_concurrent: usize,
    /// Latency under which a success counts as "fast".
    pub target_latency_ms: u64,
    /// Multiplicative decrease applied on failure or severe slowness.
    pub decrease_ratio: f64,
    /// Fast successes required for a `+1` increase (halved under backlog, min 5).
    pub successes_for_increase: u32,
    /// Queue depth at which growth is boosted.
    pub backlog_boost_threshold: usize,
}

impl AdaptiveConfig {
    /// Limit the queue starts with: the floor, but never below 1.
    #[inline]
    pub fn initial_limit(&self) -> usize {
        self.min_concurrent.max(1)
    }

    /// Decrease ratio with the `(0, 1)` fallback applied.
    ///
    /// ```rust
    /// use seatvisor::AdaptiveConfig;
    ///
    /// let mut cfg = AdaptiveConfig::default();
    /// cfg.decrease_ratio = 1.5;
    /// assert_eq!(cfg.effective_decrease_ratio(), 0.7);
    /// ```
    #[inline]
    pub fn effective_decrease_ratio(&self) -> f64 {
        if self.decrease_ratio > 0.0 && self.decrease_ratio < 1.0 {
            self.decrease_ratio
        } else {
            FALLBACK_DECREASE_RATIO
        }
    }

    /// Target latency as a [`Duration`].
    #[inline]
    pub fn target_latency(&self) -> Duration {
        Duration::from_millis(self.target_latency_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                reason: "adaptive.max_concurrent must be at least 1".into(),
            });
        }
        if self.min_concurrent > self.max_concurrent {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "adaptive.min_concurrent ({}) exceeds adaptive.max_concurrent ({})",
                    self.min_concurrent, self.max_concurrent
                ),
            });
        }
        Ok(())
    }
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            min_concurrent: 20,
            max_concurrent: 200,
            target_latency_ms: 250,
            decrease_ratio: FALLBACK_DECREASE_RATIO,
            successes_for_increase: 50,
            backlog_boost_threshold: 500,
        }
    }
}

/// Settings of the round-robin edge dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Backend base URLs, visited in order.
    pub servers: Vec<String>,
    /// Per-call timeout in milliseconds (`0` = no timeout).
    pub request_timeout_ms: u64,
    /// Largest backend response body the proxy buffers.
    pub max_body_bytes: usize,
}

impl DispatcherConfig {
    /// Builds a config from a comma separated server list.
    ///
    /// ```rust
    /// use seatvisor::DispatcherConfig;
    ///
    /// let cfg = DispatcherConfig::with_servers(DispatcherConfig::parse_servers(" http://a:1, http://b:2,"));
    /// assert_eq!(cfg.servers, vec!["http://a:1", "http://b:2"]);
    /// ```
    pub fn with_servers(servers: Vec<String>) -> Self {
        Self {
            servers,
            ..Self::default()
        }
    }

    /// Splits a comma separated list, trimming blanks and dropping empty items.
    pub fn parse_servers(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Returns the per-call timeout as an `Option`.
    #[inline]
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid {
                reason: "dispatcher.max_body_bytes must be positive".into(),
            });
        }
        Ok(())
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            servers: vec![
                "http://localhost:8081".into(),
                "http://localhost:8082".into(),
                "http://localhost:8083".into(),
            ],
            request_timeout_ms: 10_000,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.adaptive.min_concurrent, 20);
        assert_eq!(cfg.adaptive.max_concurrent, 200);
        assert_eq!(cfg.adaptive.successes_for_increase, 50);
        assert_eq!(cfg.adaptive.backlog_boost_threshold, 500);
        assert_eq!(cfg.dispatcher.servers.len(), 3);
        assert_eq!(cfg.grace(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_floor_above_ceiling_rejected() {
        let err = Config::from_toml_str(
            r#"
            [adaptive]
            min_concurrent = 50
            max_concurrent = 10
            "#,
        )
        .unwrap_err();
        assert_eq!(err.as_label(), "config_invalid");
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = Config::from_toml_str("adaptive = 3").unwrap_err();
        assert_eq!(err.as_label(), "config_parse");
    }

    #[test]
    fn test_decrease_ratio_fallback() {
        let mut cfg = AdaptiveConfig::default();
        for bad in [0.0, -0.2, 1.0, 3.0] {
            cfg.decrease_ratio = bad;
            assert_eq!(cfg.effective_decrease_ratio(), FALLBACK_DECREASE_RATIO);
        }
        cfg.decrease_ratio = 0.5;
        assert_eq!(cfg.effective_decrease_ratio(), 0.5);
    }

    #[test]
    fn test_initial_limit_never_zero() {
        let cfg = AdaptiveConfig {
            min_concurrent: 0,
            ..AdaptiveConfig::default()
        };
        assert_eq!(cfg.initial_limit(), 1);
    }

    #[test]
    fn test_zero_sentinels() {
        let cfg = Config {
            grace_ms: 0,
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.grace(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);

        let d = DispatcherConfig {
            request_timeout_ms: 0,
            ..DispatcherConfig::default()
        };
        assert_eq!(d.request_timeout(), None);
    }
}
