//! Execution bridge
//!
//! Drives an [`ApiRequest`] through the transport without blocking the
//! caller. Each logical call gets exactly one terminal callback, whether it
//! succeeds, fails, or is retried once along the way.
//!
//! ## Flow
//!
//! 1. `execute_unparsed` submits the attempt and returns a deferred response.
//! 2. A [`CompletionHandler`] is attached to it and runs on a transport thread.
//! 3. Non-2xx responses go through the unsuccessful-response handler and the
//!    redirect policy. If either handled it and this was the first attempt,
//!    the body is closed and the call is submitted again. An accepted redirect
//!    target travels with that retry only; the request object is shared and
//!    never holds per-call state.
//! 4. 2xx responses are decoded according to `Content-Encoding` and parsed.

use bridge_traits::{
    BridgeError, CancellationToken, FutureCallback, HttpRequest, Outcome, RequestHandle,
    ResponseEnvelope,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info_span, warn, Span};
use uuid::Uuid;

use crate::decoder;
use crate::error::{ExecutionError, HttpResponseError};
use crate::request::{ApiRequest, Redirect, Submission};

/// Caller-facing callback of a logical call.
pub type ExecutionCallback<T> = Box<dyn FutureCallback<T, ExecutionError>>;

/// Which submission of a logical call a response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retry,
}

/// What to do with an unsuccessful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Neither the handler nor the redirect policy claimed the response
    NotHandled,
    /// Handled on the first attempt; submit once more
    RetryNeeded,
    /// Handled, but the retry has already been spent
    RetryExhausted,
}

impl RetryDecision {
    pub fn decide(handled: bool, attempt: Attempt) -> Self {
        match (handled, attempt) {
            (false, _) => Self::NotHandled,
            (true, Attempt::First) => Self::RetryNeeded,
            (true, Attempt::Retry) => Self::RetryExhausted,
        }
    }
}

struct Call<R> {
    id: Uuid,
    request: Arc<R>,
    cancel: CancellationToken,
    span: Span,
}

/// Execute `request` asynchronously.
///
/// Returns immediately. The outcome is delivered to `callback` on a
/// transport thread; failures to submit are reported the same way. The
/// returned handle cancels the call, including a pending retry.
pub fn execute_async<R: ApiRequest>(
    request: Arc<R>,
    callback: ExecutionCallback<R::Output>,
) -> RequestHandle {
    let handle = RequestHandle::new();
    let id = Uuid::new_v4();
    let call = Arc::new(Call {
        id,
        request,
        cancel: handle.token(),
        span: info_span!("api_call", call_id = %id),
    });

    submit(call, Attempt::First, None, callback);
    handle
}

/// Execute `request` and wait for its outcome.
///
/// Dropping the returned future cancels the call.
pub async fn execute<R: ApiRequest>(request: Arc<R>) -> Result<R::Output, ExecutionError> {
    let (tx, rx) = oneshot::channel::<Outcome<R::Output, ExecutionError>>();
    let handle = execute_async(request, Box::new(tx));
    let _cancel_on_drop = handle.cancel_on_drop();

    match rx.await {
        Ok(outcome) => outcome.into_result(|| ExecutionError::Cancelled),
        Err(_) => Err(ExecutionError::defect(
            "Call ended without a terminal notification",
            BridgeError::OperationFailed("callback dropped".to_string()),
        )),
    }
}

fn submit<R: ApiRequest>(
    call: Arc<Call<R>>,
    attempt: Attempt,
    redirect: Option<Redirect>,
    callback: ExecutionCallback<R::Output>,
) {
    let span = call.span.clone();
    let _entered = span.enter();

    match call.request.execute_unparsed(redirect.as_ref()) {
        Ok(Submission { request, response }) => {
            debug!(?attempt, method = %request.method, url = %request.url, "Request submitted");
            let cancel = call.cancel.clone();
            let handler = CompletionHandler {
                call,
                attempt,
                request,
                callback,
            };
            response.with_callback(Box::new(handler), cancel);
        }
        Err(e) => {
            let context = match attempt {
                Attempt::First => "Failed to submit request",
                Attempt::Retry => "Failed to resubmit request for retry",
            };
            warn!(error = %e, ?attempt, "{}", context);
            callback.failed(ExecutionError::defect(context, e));
        }
    }
}

/// Receives the realized response of one attempt.
struct CompletionHandler<R: ApiRequest> {
    call: Arc<Call<R>>,
    attempt: Attempt,
    /// The request as it was sent
    request: HttpRequest,
    callback: ExecutionCallback<R::Output>,
}

impl<R: ApiRequest> CompletionHandler<R> {
    fn on_response(self, mut envelope: ResponseEnvelope) {
        let status = envelope.status();
        debug!(status, attempt = ?self.attempt, "Response received");

        if let Some(interceptor) = self.call.request.interceptor() {
            let mut intercepted = self.request.clone();
            if let Err(e) = interceptor.intercept(&mut intercepted) {
                envelope.close_content();
                warn!(error = %e, "Interceptor failed on completion");
                self.callback
                    .failed(ExecutionError::defect("Interceptor failed on completion", e));
                return;
            }
        }

        if !envelope.is_success() {
            self.on_unsuccessful(envelope);
            return;
        }

        let encoding = envelope.content_encoding().map(str::to_string);
        let charset = envelope.charset().map(str::to_string);
        let Some(content) = envelope.take_content() else {
            self.callback.failed(ExecutionError::defect(
                "Response content already consumed",
                BridgeError::OperationFailed(format!("no content for HTTP {}", status)),
            ));
            return;
        };

        let decoded = decoder::decode(content, encoding.as_deref());
        match self
            .call
            .request
            .parser()
            .parse_and_close(decoded, charset.as_deref())
        {
            Ok(result) => {
                debug!(status, "Call completed");
                self.callback.completed(result);
            }
            Err(e) => {
                warn!(error = %e, status, "Failed to parse response");
                self.callback.failed(e.into());
            }
        }
    }

    fn on_unsuccessful(self, mut envelope: ResponseEnvelope) {
        let status = envelope.status();

        let (decision, redirect) = match self.retry_decision(&envelope) {
            Ok(decided) => decided,
            Err(e) => {
                envelope.close_content();
                warn!(error = %e, status, "Unsuccessful response handler failed");
                self.callback.failed(ExecutionError::defect(
                    "Unsuccessful response handler failed",
                    e,
                ));
                return;
            }
        };

        envelope.close_content();
        match decision {
            RetryDecision::RetryNeeded => {
                warn!(status, "Unsuccessful response handled, retrying once");
                submit(self.call, Attempt::Retry, redirect, self.callback);
            }
            RetryDecision::NotHandled | RetryDecision::RetryExhausted => {
                warn!(status, ?decision, "Call failed with unsuccessful status");
                self.callback
                    .failed(HttpResponseError::from_envelope(&envelope).into());
            }
        }
    }

    /// The handler and the redirect policy are both consulted; either one
    /// claiming the response makes it handled. A redirect target is only
    /// returned when there is a retry left to carry it.
    fn retry_decision(
        &self,
        envelope: &ResponseEnvelope,
    ) -> Result<(RetryDecision, Option<Redirect>), BridgeError> {
        let handled_by_handler = match self.call.request.unsuccessful_response_handler() {
            Some(handler) => handler.handle_response(&self.request, envelope, true)?,
            None => false,
        };
        let redirect = self
            .call
            .request
            .handle_redirect(&self.request, envelope.status(), envelope.headers());
        let redirected = redirect.is_some();

        debug!(handled_by_handler, redirected, "Unsuccessful response inspected");
        let decision = RetryDecision::decide(handled_by_handler || redirected, self.attempt);
        let redirect = redirect.filter(|_| decision == RetryDecision::RetryNeeded);
        Ok((decision, redirect))
    }
}

impl<R: ApiRequest> FutureCallback<ResponseEnvelope> for CompletionHandler<R> {
    fn completed(self: Box<Self>, envelope: ResponseEnvelope) {
        let span = self.call.span.clone();
        let _entered = span.enter();
        (*self).on_response(envelope);
    }

    fn failed(self: Box<Self>, error: BridgeError) {
        let span = self.call.span.clone();
        let _entered = span.enter();
        warn!(error = %error, attempt = ?self.attempt, "Transport failed");
        self.callback.failed(ExecutionError::Transport(error));
    }

    fn cancelled(self: Box<Self>) {
        let span = self.call.span.clone();
        let _entered = span.enter();
        debug!(call_id = %self.call.id, "Call cancelled");
        self.callback.cancelled();
    }
}
