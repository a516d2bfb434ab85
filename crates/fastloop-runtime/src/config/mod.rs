//! Runtime configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (`from_env`)
//! 3. The file named by `FL_CONFIG_RS` at build time
//! 4. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use fastloop_runtime::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env()
//!     .queue_init_nodes(4096)
//!     .queue_max_increment(16 * 1024);
//! config.validate()?;
//! ```

pub mod defaults;

use fastloop_core::env::{env_get, env_get_nonzero};
use fastloop_core::BackoffConfig;

/// Sizing and tuning knobs for pools, queues and the spin lock backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Slots a timer pool starts with
    pub pool_init_blocks: usize,
    /// Cap on slots added per pool growth step
    pub pool_max_increment: usize,
    /// Items the fast queue reserves up front
    pub queue_init_nodes: usize,
    /// Cap on items added per queue growth step
    pub queue_max_increment: usize,
    /// Spin lock backoff thresholds
    pub backoff: BackoffConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional, zero sizes keep the default):
    /// - `FL_POOL_INIT_BLOCKS`
    /// - `FL_POOL_MAX_INCREMENT`
    /// - `FL_QUEUE_INIT_NODES`
    /// - `FL_QUEUE_MAX_INCREMENT`
    /// - `FL_BACKOFF_PAUSE_MAX`
    /// - `FL_BACKOFF_YIELD_MAX`
    /// - `FL_BACKOFF_SLEEP_MAX_MS`
    pub fn from_env() -> Self {
        Self {
            pool_init_blocks: env_get_nonzero("FL_POOL_INIT_BLOCKS", defaults::POOL_INIT_BLOCKS),
            pool_max_increment: env_get_nonzero(
                "FL_POOL_MAX_INCREMENT",
                defaults::POOL_MAX_INCREMENT,
            ),
            queue_init_nodes: env_get_nonzero("FL_QUEUE_INIT_NODES", defaults::QUEUE_INIT_NODES),
            queue_max_increment: env_get_nonzero(
                "FL_QUEUE_MAX_INCREMENT",
                defaults::QUEUE_MAX_INCREMENT,
            ),
            backoff: BackoffConfig {
                pause_max: env_get("FL_BACKOFF_PAUSE_MAX", defaults::BACKOFF_PAUSE_MAX),
                yield_max: env_get("FL_BACKOFF_YIELD_MAX", defaults::BACKOFF_YIELD_MAX),
                sleep_max_ms: env_get("FL_BACKOFF_SLEEP_MAX_MS", defaults::BACKOFF_SLEEP_MAX_MS),
            },
        }
    }

    /// Compile-time defaults only, no environment lookup
    pub fn new() -> Self {
        Self {
            pool_init_blocks: defaults::POOL_INIT_BLOCKS,
            pool_max_increment: defaults::POOL_MAX_INCREMENT,
            queue_init_nodes: defaults::QUEUE_INIT_NODES,
            queue_max_increment: defaults::QUEUE_MAX_INCREMENT,
            backoff: BackoffConfig {
                pause_max: defaults::BACKOFF_PAUSE_MAX,
                yield_max: defaults::BACKOFF_YIELD_MAX,
                sleep_max_ms: defaults::BACKOFF_SLEEP_MAX_MS,
            },
        }
    }

    pub fn pool_init_blocks(mut self, n: usize) -> Self {
        self.pool_init_blocks = n;
        self
    }

    pub fn pool_max_increment(mut self, n: usize) -> Self {
        self.pool_max_increment = n;
        self
    }

    pub fn queue_init_nodes(mut self, n: usize) -> Self {
        self.queue_init_nodes = n;
        self
    }

    pub fn queue_max_increment(mut self, n: usize) -> Self {
        self.queue_max_increment = n;
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_init_blocks == 0 {
            return Err(ConfigError::InvalidValue("pool_init_blocks must be > 0"));
        }
        if self.pool_max_increment == 0 {
            return Err(ConfigError::InvalidValue("pool_max_increment must be > 0"));
        }
        if self.queue_init_nodes == 0 {
            return Err(ConfigError::InvalidValue("queue_init_nodes must be > 0"));
        }
        if self.queue_max_increment == 0 {
            return Err(ConfigError::InvalidValue("queue_max_increment must be > 0"));
        }
        if self.pool_init_blocks > u32::MAX as usize {
            return Err(ConfigError::InvalidValue("pool_init_blocks must fit in u32"));
        }
        self.backoff.validate().map_err(ConfigError::InvalidValue)
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("fastloop configuration:");
        eprintln!("  pool_init_blocks:     {}", self.pool_init_blocks);
        eprintln!("  pool_max_increment:   {}", self.pool_max_increment);
        eprintln!("  queue_init_nodes:     {}", self.queue_init_nodes);
        eprintln!("  queue_max_increment:  {}", self.queue_max_increment);
        eprintln!("  backoff.pause_max:    {}", self.backoff.pause_max);
        eprintln!("  backoff.yield_max:    {}", self.backoff.yield_max);
        eprintln!("  backoff.sleep_max_ms: {}", self.backoff.sleep_max_ms);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
