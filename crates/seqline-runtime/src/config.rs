//! Configuration Management
//!
//! Configuration for Seqline runtimes is layered with figment, lowest priority
//! first:
//! 1. Default values
//! 2. Configuration file (`seqline.toml`)
//! 3. Environment variables (`SEQLINE_*`, nested keys split on `__`, e.g.
//!    `SEQLINE_POOL__MAX_BLOCKING_THREADS=32`)

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use seqline_core::{SeqlineError, SeqlineResult};
use serde::{Deserialize, Serialize};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "seqline.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SEQLINE_";

// ----------------------------------------------------------------------------
// Worker Pool Configuration
// ----------------------------------------------------------------------------

/// Sizing for a runtime owned by `TokioWorkerPool`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound on threads executing drain activations
    pub max_blocking_threads: usize,
    /// Async worker threads of the owned runtime
    pub worker_threads: usize,
    /// Name given to pool threads
    pub thread_name: String,
    /// How long an idle blocking thread is kept alive
    pub keep_alive_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_blocking_threads: 64, // one busy lane never starves the others
            worker_threads: 2,        // activations run on the blocking pool
            thread_name: "seqline-worker".to_string(),
            keep_alive_ms: 10_000,
        }
    }
}

impl PoolConfig {
    /// Small pool for tests
    pub fn testing() -> Self {
        Self {
            max_blocking_threads: 8,
            worker_threads: 1,
            thread_name: "seqline-test".to_string(),
            keep_alive_ms: 1_000,
        }
    }

    /// Large pool for servers with many concurrently busy connections
    pub fn high_throughput() -> Self {
        Self {
            max_blocking_threads: 512,
            worker_threads: 4,
            keep_alive_ms: 30_000,
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Logging Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: trace, debug, info, warn or error
    pub level: String,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
            with_thread_ids: false,
            ansi: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Client Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Buffer size of the channel carrying async error notifications to the app
    pub app_event_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_event_buffer_size: 64, // UI updates need responsiveness
        }
    }
}

// ----------------------------------------------------------------------------
// Top-Level Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for a Seqline runtime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeqlineConfig {
    pub pool: PoolConfig,
    pub logging: LoggingConfig,
    pub client: ClientConfig,
}

impl SeqlineConfig {
    /// Configuration tuned for tests
    pub fn testing() -> Self {
        Self {
            pool: PoolConfig::testing(),
            logging: LoggingConfig {
                level: "debug".to_string(),
                ansi: false,
                ..LoggingConfig::default()
            },
            client: ClientConfig {
                app_event_buffer_size: 100,
            },
        }
    }

    /// Load from `seqline.toml` and `SEQLINE_*` variables over the defaults
    pub fn load() -> SeqlineResult<Self> {
        Self::extract(Self::base().merge(Toml::file(DEFAULT_CONFIG_FILE)).merge(Self::env()))
    }

    /// Load from a specific file, still honouring environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SeqlineResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SeqlineError::config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        Self::extract(Self::base().merge(Toml::file(path)).merge(Self::env()))
    }

    /// Parse a TOML document over the defaults, without environment overrides
    pub fn from_toml_str(toml: &str) -> SeqlineResult<Self> {
        Self::extract(Self::base().merge(Toml::string(toml)))
    }

    pub fn to_toml_string(&self) -> SeqlineResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SeqlineError::config(format!("failed to serialize config: {e}")))
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> SeqlineResult<()> {
        if self.pool.max_blocking_threads == 0 {
            return Err(SeqlineError::config(
                "pool.max_blocking_threads must be greater than 0",
            ));
        }
        if self.pool.worker_threads == 0 {
            return Err(SeqlineError::config(
                "pool.worker_threads must be greater than 0",
            ));
        }
        if self.client.app_event_buffer_size == 0 {
            return Err(SeqlineError::config(
                "client.app_event_buffer_size must be greater than 0",
            ));
        }
        self.logging.max_level()?;
        Ok(())
    }

    fn base() -> Figment {
        Figment::new().merge(Serialized::defaults(Self::default()))
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }

    fn extract(figment: Figment) -> SeqlineResult<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| SeqlineError::config(format!("failed to load configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

impl LoggingConfig {
    /// Parsed `level`
    pub fn max_level(&self) -> SeqlineResult<tracing::Level> {
        self.level
            .parse()
            .map_err(|_| SeqlineError::config(format!("unknown log level: {}", self.level)))
    }
}
