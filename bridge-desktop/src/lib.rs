//! # Desktop Bridge Implementations
//!
//! Default non-blocking HTTP transport for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! [`ReqwestTransport`] implements `HttpTransport` on top of `reqwest`,
//! driven by an owned multi-thread Tokio runtime:
//! - the runtime and client start on the first request
//! - request bodies are streamed from a blocking writer, fixed-length or chunked
//! - completion callbacks run on a blocking thread and may read the body
//!   synchronously while it is still arriving
//! - `shutdown` (or drop) stops the runtime
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestTransport, TransportConfig};
//! use bridge_traits::{HttpMethod, HttpTransport};
//!
//! let transport = ReqwestTransport::with_config(TransportConfig::default())?;
//! let request = transport.build_request(&HttpMethod::Get, "https://api.example.com/users")?;
//! let deferred = request.execute()?;
//! ```

mod config;
mod http;

pub use config::{
    TransportConfig, TransportConfigBuilder, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT,
    DEFAULT_SHUTDOWN_GRACE, DEFAULT_WORKER_THREADS,
};
pub use http::ReqwestTransport;
