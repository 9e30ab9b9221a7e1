//! Workspace facade crate.
//!
//! Re-exports the execution bridge and the transport contract so host
//! applications can depend on `nio-bridge` alone. The `desktop` feature (on by
//! default) pulls in the reqwest-backed transport adapter; `logging` exposes
//! the `tracing-subscriber` setup from `core-runtime`.

pub use bridge_traits::{
    BridgeError, ByteArrayContent, DeferredResponse, FutureCallback, HeaderList, HttpContent,
    HttpMethod, HttpRequest, HttpTransport, JsonContent, LowLevelRequest, Outcome, RequestHandle,
    ResponseContent, ResponseEnvelope, StreamingContent,
};
pub use core_executor::{
    execute, execute_async, ApiRequest, BearerCredential, ClientRequest, ClientRequestBuilder,
    ExecuteInterceptor, ExecutionCallback, ExecutionError, HttpResponseError, JsonObjectParser,
    ObjectParser, ParseError, Redirect, TokenRefresher, UnsuccessfulResponseHandler,
};

#[cfg(feature = "desktop")]
pub use bridge_desktop::{ReqwestTransport, TransportConfig};

#[cfg(feature = "logging")]
pub use core_runtime::logging;
