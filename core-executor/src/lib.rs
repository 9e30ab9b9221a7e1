//! # Core Executor
//!
//! Asynchronous execution of API requests over a non-blocking transport.
//!
//! ## Overview
//!
//! An [`ApiRequest`] submits through a synchronous-looking transport builder
//! and gets back a deferred response. [`execute_async`] attaches a completion
//! handler to it that:
//! - gives the unsuccessful-response handler and the redirect policy a chance
//!   to recover from a non-2xx status, retrying at most once
//! - decodes `gzip` / `deflate` content
//! - parses the body and reports exactly one outcome to the caller
//!
//! [`execute`] wraps the same flow in a future.
//!
//! ## Usage
//!
//! ```ignore
//! use core_executor::{execute, BearerCredential, ClientRequest};
//! use bridge_desktop::ReqwestTransport;
//! use bridge_traits::HttpMethod;
//! use std::sync::Arc;
//!
//! let transport = Arc::new(ReqwestTransport::new());
//! let credential = Arc::new(BearerCredential::new("token"));
//! let request = ClientRequest::<UserList>::builder(transport, HttpMethod::Get, "https://api.example.com/users")
//!     .interceptor(credential.clone())
//!     .unsuccessful_response_handler(credential)
//!     .build()?;
//!
//! let users = execute(Arc::new(request)).await?;
//! ```

pub mod credential;
pub mod decoder;
pub mod error;
pub mod executor;
pub mod parser;
pub mod request;

pub use credential::{BearerCredential, TokenRefresher};
pub use decoder::{decode, ContentEncoding};
pub use error::{ExecutionError, HttpResponseError};
pub use executor::{execute, execute_async, Attempt, ExecutionCallback, RetryDecision};
pub use parser::{JsonObjectParser, ObjectParser, ParseError};
pub use request::{
    ApiRequest, ClientRequest, ClientRequestBuilder, ExecuteInterceptor, Redirect, Submission,
    UnsuccessfulResponseHandler,
};
