use std::any::Any;
use std::path::PathBuf;

use thiserror::Error;
use tokio::task::JoinError;

use crate::store::StoreError;

/// Failures that come from the runtime rather than from the work itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was aborted before it completed")]
    Aborted,
}

impl TaskError {
    /// Builds a [`TaskError::Panicked`] from a raw panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        TaskError::Panicked(panic_message(payload))
    }
}

impl From<JoinError> for TaskError {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            TaskError::from_panic(&*err.into_panic())
        } else {
            TaskError::Aborted
        }
    }
}

/// Raised by [`CancellableLoop`](crate::CancellableLoop) when its token fires.
///
/// Callers are expected to treat this as a normal way for the loop to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled after {completed_steps} step(s)")]
pub struct Cancelled {
    pub completed_steps: usize,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("background operation failed: {0}")]
    Background(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to start worker pool: {0}")]
    Runtime(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
