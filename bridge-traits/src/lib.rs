//! # Transport Bridge Traits
//!
//! Contract between the execution bridge and a non-blocking HTTP engine.
//!
//! ## Overview
//!
//! The execution bridge drives requests through a builder that looks
//! synchronous: build a request, attach headers and content, call `execute`.
//! Underneath, `execute` only submits the exchange and returns a
//! [`DeferredResponse`]. The realized [`ResponseEnvelope`] arrives later on a
//! transport thread, through a [`FutureCallback`] attached to that handle.
//!
//! ## Traits
//!
//! - [`HttpTransport`] - engine lifecycle (lazy start, explicit shutdown) and request factory
//! - [`LowLevelRequest`] - per-exchange request builder
//! - [`PendingExchange`] - transport half of a submitted exchange
//! - [`FutureCallback`] - single terminal notification (`completed`, `failed`, `cancelled`)
//! - [`StreamingContent`] - repeatable request body writer
//!
//! ## Error Handling
//!
//! All transport operations use [`BridgeError`]. Implementations should
//! convert engine-specific errors into it with actionable messages.
//!
//! ## Thread Safety
//!
//! Transports are `Send + Sync` and shared across every call made through
//! them. Callbacks are `Send` because they fire on transport threads, never
//! on the submitting thread.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::{callback::from_fn, HttpMethod, HttpTransport, Outcome, RequestHandle};
//!
//! fn fetch(transport: &dyn HttpTransport) -> bridge_traits::error::Result<()> {
//!     let mut request = transport.build_request(&HttpMethod::Get, "https://api.example.com/users")?;
//!     request.add_header("Accept", "application/json")?;
//!     let deferred = request.execute()?;
//!     deferred.with_callback(
//!         from_fn(|outcome: Outcome<_>| println!("{:?}", outcome.is_completed())),
//!         RequestHandle::new().token(),
//!     );
//!     Ok(())
//! }
//! ```

pub mod callback;
pub mod error;
pub mod http;
pub mod transport;

pub use error::BridgeError;

// Re-export commonly used types
pub use callback::{FutureCallback, Outcome};
pub use http::{
    ByteArrayContent, HeaderList, HttpContent, HttpMethod, HttpRequest, JsonContent,
    ResponseContent, ResponseEnvelope, StreamingContent,
};
pub use transport::{
    DeferredResponse, HttpTransport, LowLevelRequest, PendingExchange, RequestHandle,
    ResponseCallback,
};
pub use tokio_util::sync::CancellationToken;
