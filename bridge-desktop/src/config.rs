//! # Transport Configuration
//!
//! Builder for the settings of [`ReqwestTransport`](crate::ReqwestTransport).
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::TransportConfig;
//! use std::time::Duration;
//!
//! let config = TransportConfig::builder()
//!     .connect_timeout(Duration::from_secs(5))
//!     .read_timeout(Duration::from_secs(10))
//!     .worker_threads(4)
//!     .build()
//!     .expect("valid transport config");
//! ```
//!
//! `build()` validates every value and fails fast with
//! `BridgeError::InvalidConfig` naming the offending setting.

use bridge_traits::error::{BridgeError, Result};
use std::time::Duration;

/// Default connect timeout (3 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default socket read timeout (3 seconds)
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Default number of engine worker threads
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Default time to wait for engine tasks on shutdown
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Settings of the non-blocking engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Maximum time to establish a connection
    pub connect_timeout: Duration,
    /// Maximum idle time between two reads on a connection
    pub read_timeout: Duration,
    /// Optional deadline for a whole exchange, headers and body included
    pub request_timeout: Option<Duration>,
    /// Worker threads of the engine runtime
    pub worker_threads: usize,
    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
    /// `User-Agent` sent when the request does not set one
    pub user_agent: String,
    /// How long `shutdown` waits for engine tasks before abandoning them
    pub shutdown_grace: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            request_timeout: None,
            worker_threads: DEFAULT_WORKER_THREADS,
            pool_max_idle_per_host: 10,
            user_agent: concat!("nio-bridge/", env!("CARGO_PKG_VERSION")).to_string(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl TransportConfig {
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }

    /// Check every setting, reporting the first invalid one.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(invalid("connect_timeout must be greater than zero"));
        }
        if self.read_timeout.is_zero() {
            return Err(invalid("read_timeout must be greater than zero"));
        }
        if matches!(self.request_timeout, Some(t) if t.is_zero()) {
            return Err(invalid("request_timeout must be greater than zero when set"));
        }
        if self.worker_threads == 0 {
            return Err(invalid("worker_threads must be at least 1"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent must not be empty"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> BridgeError {
    BridgeError::InvalidConfig(message.to_string())
}

/// Builder for [`TransportConfig`].
#[derive(Debug, Default)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads;
        self
    }

    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<TransportConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
