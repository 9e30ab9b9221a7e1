//! Transport abstraction
//!
//! The transport exposes a synchronous-looking builder: `build_request`
//! returns a low-level request, headers and content are attached, and
//! `execute` hands back a [`DeferredResponse`] straight away. The network
//! result only becomes available once a callback is attached to that handle.

use std::fmt;
use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::callback::FutureCallback;
use crate::error::Result;
use crate::http::{HttpContent, HttpMethod, ResponseEnvelope};

/// Callback receiving the realized response of one exchange.
pub type ResponseCallback = Box<dyn FutureCallback<ResponseEnvelope>>;

/// Non-blocking HTTP engine.
///
/// Implementations own the engine's threads and connections. The engine is
/// shared by every request built from it and must be shut down once, after
/// all outstanding exchanges have completed.
pub trait HttpTransport: Send + Sync {
    /// Create a request for `method` and `url`, starting the engine if it is
    /// not running yet.
    fn build_request(&self, method: &HttpMethod, url: &str) -> Result<Box<dyn LowLevelRequest>>;

    /// Release the engine's threads and connections.
    fn shutdown(&self) -> Result<()>;
}

/// A request being assembled for one exchange.
pub trait LowLevelRequest: Send {
    fn add_header(&mut self, name: &str, value: &str) -> Result<()>;

    fn set_content(&mut self, content: HttpContent);

    fn set_timeout(&mut self, timeout: Duration);

    /// Submit the request. The returned handle is not resolved yet.
    fn execute(self: Box<Self>) -> Result<DeferredResponse>;
}

/// Transport-side half of a submitted exchange.
pub trait PendingExchange: Send {
    /// Start the network I/O and report the outcome to `callback`, exactly
    /// once, on a transport thread. Firing `cancel` before the response
    /// arrives reports `cancelled()`.
    fn dispatch(self: Box<Self>, callback: ResponseCallback, cancel: CancellationToken);
}

/// A response that will exist.
///
/// Carries the concrete network request and the transport handle needed to
/// run it. It has no status, headers or body; attach a callback with
/// [`with_callback`](Self::with_callback) to receive the realized
/// [`ResponseEnvelope`]. Attaching consumes the handle.
pub struct DeferredResponse {
    method: HttpMethod,
    url: String,
    exchange: Box<dyn PendingExchange>,
}

impl DeferredResponse {
    pub fn new(method: HttpMethod, url: impl Into<String>, exchange: Box<dyn PendingExchange>) -> Self {
        Self {
            method,
            url: url.into(),
            exchange,
        }
    }

    pub fn method(&self) -> &HttpMethod {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn with_callback(self, callback: ResponseCallback, cancel: CancellationToken) {
        self.exchange.dispatch(callback, cancel);
    }
}

impl fmt::Debug for DeferredResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredResponse")
            .field("method", &self.method)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Caller-side handle of a logical call, used to cancel it.
#[derive(Debug, Clone, Default)]
pub struct RequestHandle {
    token: CancellationToken,
}

impl RequestHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token shared with every exchange of this call.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the call when the returned guard is dropped.
    pub fn cancel_on_drop(self) -> DropGuard {
        self.token.drop_guard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{from_fn, Outcome};
    use crate::http::{HeaderList, ResponseContent};
    use std::sync::mpsc;

    struct ImmediateExchange {
        status: u16,
    }

    impl PendingExchange for ImmediateExchange {
        fn dispatch(self: Box<Self>, callback: ResponseCallback, cancel: CancellationToken) {
            if cancel.is_cancelled() {
                callback.cancelled();
            } else {
                callback.completed(ResponseEnvelope::new(
                    self.status,
                    HeaderList::new(),
                    ResponseContent::empty(),
                ));
            }
        }
    }

    #[test]
    fn test_deferred_response_dispatches_on_callback() {
        let deferred = DeferredResponse::new(
            HttpMethod::Get,
            "http://localhost/users",
            Box::new(ImmediateExchange { status: 204 }),
        );
        assert_eq!(deferred.method(), &HttpMethod::Get);
        assert_eq!(deferred.url(), "http://localhost/users");

        let (tx, rx) = mpsc::channel();
        deferred.with_callback(
            from_fn(move |outcome: Outcome<ResponseEnvelope>| {
                tx.send(outcome).unwrap();
            }),
            CancellationToken::new(),
        );

        match rx.recv().unwrap() {
            Outcome::Completed(envelope) => assert_eq!(envelope.status(), 204),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_request_handle_cancellation() {
        let handle = RequestHandle::new();
        let token = handle.token();
        assert!(!token.is_cancelled());

        let guard = handle.clone().cancel_on_drop();
        drop(guard);
        assert!(token.is_cancelled());
        assert!(handle.is_cancelled());
    }
}
