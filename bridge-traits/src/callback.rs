//! Completion callbacks
//!
//! A callback receives exactly one terminal notification. The terminal
//! methods consume the boxed callback, so invoking a second one cannot be
//! expressed.

use std::fmt;
use std::sync::mpsc;

use crate::error::BridgeError;

/// Receiver of the terminal outcome of an asynchronous operation.
pub trait FutureCallback<T, E = BridgeError>: Send + 'static {
    fn completed(self: Box<Self>, result: T);

    fn failed(self: Box<Self>, error: E);

    fn cancelled(self: Box<Self>);
}

/// Terminal outcome as a value.
#[derive(Debug)]
pub enum Outcome<T, E = BridgeError> {
    Completed(T),
    Failed(E),
    Cancelled,
}

impl<T, E> Outcome<T, E> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Convert into a `Result`, mapping cancellation through `on_cancel`.
    pub fn into_result(self, on_cancel: impl FnOnce() -> E) -> Result<T, E> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed(error) => Err(error),
            Self::Cancelled => Err(on_cancel()),
        }
    }
}

/// Adapt a closure into a callback that receives the outcome.
pub fn from_fn<T, E, F>(f: F) -> Box<dyn FutureCallback<T, E>>
where
    T: 'static,
    E: 'static,
    F: FnOnce(Outcome<T, E>) + Send + 'static,
{
    Box::new(FnCallback(f))
}

struct FnCallback<F>(F);

impl<T, E, F> FutureCallback<T, E> for FnCallback<F>
where
    F: FnOnce(Outcome<T, E>) + Send + 'static,
{
    fn completed(self: Box<Self>, result: T) {
        (self.0)(Outcome::Completed(result))
    }

    fn failed(self: Box<Self>, error: E) {
        (self.0)(Outcome::Failed(error))
    }

    fn cancelled(self: Box<Self>) {
        (self.0)(Outcome::Cancelled)
    }
}

impl<F> fmt::Debug for FnCallback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCallback")
    }
}

// A disconnected receiver means nobody is waiting any more; the outcome is dropped.
impl<T, E> FutureCallback<T, E> for mpsc::Sender<Outcome<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn completed(self: Box<Self>, result: T) {
        let _ = self.send(Outcome::Completed(result));
    }

    fn failed(self: Box<Self>, error: E) {
        let _ = self.send(Outcome::Failed(error));
    }

    fn cancelled(self: Box<Self>) {
        let _ = self.send(Outcome::Cancelled);
    }
}

impl<T, E> FutureCallback<T, E> for tokio::sync::oneshot::Sender<Outcome<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn completed(self: Box<Self>, result: T) {
        let _ = (*self).send(Outcome::Completed(result));
    }

    fn failed(self: Box<Self>, error: E) {
        let _ = (*self).send(Outcome::Failed(error));
    }

    fn cancelled(self: Box<Self>) {
        let _ = (*self).send(Outcome::Cancelled);
    }
}
