//! Error types for append-log operations.

use std::any::Any;
use termlog::LogError;
use thiserror::Error;

/// Errors surfaced by [`AppendLog`](crate::AppendLog) operations.
#[derive(Debug, Error)]
pub enum AppendError {
    /// Construction or claim failed in the underlying substrate.
    #[error(transparent)]
    Log(#[from] LogError),

    /// The poller thread is already running; handlers must be registered
    /// before polling starts.
    #[error("poller is already running; register handlers before start_polling")]
    PollerActive,
}

/// A failure caught inside the poll loop and surfaced through the error
/// callback. The loop itself always continues.
#[derive(Debug, Error)]
#[error("append handler panicked: {message}")]
pub struct PollerError {
    message: String,
}

impl PollerError {
    pub(crate) fn from_panic(panic: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = panic.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }

    /// The panic message, best effort.
    pub fn message(&self) -> &str {
        &self.message
    }
}
