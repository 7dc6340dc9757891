//! Configuration for the PlayClock server
//!
//! Configuration can be loaded from a TOML file and/or environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use playclock_core::ClockOptions;

/// Main configuration for the PlayClock server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Clock authority configuration
    #[serde(default)]
    pub clock: ClockConfig,

    /// Distribution (fan-out) configuration
    #[serde(default)]
    pub distribution: DistributionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Clock authority configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Advancement period in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Loop length in seconds; unset means the position grows unbounded
    #[serde(default)]
    pub duration_secs: Option<f64>,

    /// Whether the clock starts running
    #[serde(default = "default_true")]
    pub start_running: bool,
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            duration_secs: None,
            start_running: true,
        }
    }
}

impl ClockConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Startup options for the clock authority
    pub fn options(&self) -> ClockOptions {
        ClockOptions {
            duration: self.duration_secs,
            start_running: self.start_running,
            start_position: 0.0,
        }
    }
}

/// Distribution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Broadcast period in milliseconds
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,

    /// Per-viewer outbound queue size in snapshots
    #[serde(default = "default_viewer_buffer")]
    pub viewer_buffer: usize,

    /// Consecutive overflowing ticks before a slow viewer is evicted
    #[serde(default = "default_max_lagged_ticks")]
    pub max_lagged_ticks: u32,

    /// SSE keep-alive comment interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_broadcast_interval_ms() -> u64 {
    1000
}

fn default_viewer_buffer() -> usize {
    8
}

fn default_max_lagged_ticks() -> u32 {
    5
}

fn default_keep_alive_secs() -> u64 {
    15
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            broadcast_interval_ms: default_broadcast_interval_ms(),
            viewer_buffer: default_viewer_buffer(),
            max_lagged_ticks: default_max_lagged_ticks(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl DistributionConfig {
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from file if it exists, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.as_ref().exists() => Self::from_file(p)?,
            Some(p) => {
                tracing::warn!(
                    path = %p.as_ref().display(),
                    "Config file not found, using defaults"
                );
                Config::default()
            }
            None => Config::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PLAYCLOCK_*` environment overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("PLAYCLOCK_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PLAYCLOCK_PORT") {
            self.server.port = parse_var("PLAYCLOCK_PORT", &port)?;
        }

        // Clock
        if let Some(tick) = lookup("PLAYCLOCK_TICK_MS") {
            self.clock.tick_interval_ms = parse_var("PLAYCLOCK_TICK_MS", &tick)?;
        }
        if let Some(duration) = lookup("PLAYCLOCK_DURATION_SECS") {
            self.clock.duration_secs = if duration.trim().is_empty() {
                None
            } else {
                Some(parse_var("PLAYCLOCK_DURATION_SECS", &duration)?)
            };
        }
        if let Some(running) = lookup("PLAYCLOCK_START_RUNNING") {
            self.clock.start_running = parse_var("PLAYCLOCK_START_RUNNING", &running)?;
        }

        // Distribution
        if let Some(interval) = lookup("PLAYCLOCK_BROADCAST_MS") {
            self.distribution.broadcast_interval_ms =
                parse_var("PLAYCLOCK_BROADCAST_MS", &interval)?;
        }
        if let Some(buffer) = lookup("PLAYCLOCK_VIEWER_BUFFER") {
            self.distribution.viewer_buffer = parse_var("PLAYCLOCK_VIEWER_BUFFER", &buffer)?;
        }
        if let Some(lagged) = lookup("PLAYCLOCK_MAX_LAGGED_TICKS") {
            self.distribution.max_lagged_ticks =
                parse_var("PLAYCLOCK_MAX_LAGGED_TICKS", &lagged)?;
        }
        if let Some(keep_alive) = lookup("PLAYCLOCK_KEEP_ALIVE_SECS") {
            self.distribution.keep_alive_secs =
                parse_var("PLAYCLOCK_KEEP_ALIVE_SECS", &keep_alive)?;
        }

        Ok(())
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "clock.tick_interval_ms must be > 0".to_string(),
            ));
        }
        if let Some(d) = self.clock.duration_secs {
            if !d.is_finite() || d <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "clock.duration_secs must be a positive number, got {}",
                    d
                )));
            }
        }
        if self.distribution.broadcast_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "distribution.broadcast_interval_ms must be > 0".to_string(),
            ));
        }
        if self.distribution.viewer_buffer == 0 {
            return Err(ConfigError::Invalid(
                "distribution.viewer_buffer must be > 0".to_string(),
            ));
        }
        if self.distribution.max_lagged_ticks == 0 {
            return Err(ConfigError::Invalid(
                "distribution.max_lagged_ticks must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Socket address string to bind the HTTP listener to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env(format!("{} has invalid value {:?}", key, value)))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Environment error: {0}")]
    Env(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
