use crate::recognition::Recognizer;
use std::fmt;
use thiserror::Error;

/// Why a dispatched recognition call did not produce a result
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The engine returned an error
    #[error("recognition engine failed: {0:#}")]
    Engine(anyhow::Error),

    /// The worker running the call panicked
    #[error("recognition worker panicked: {0}")]
    WorkerPanicked(String),

    /// The pool no longer accepts work
    #[error("recognition pool is closed")]
    PoolClosed,
}

/// A failed `Dispatcher::run`, with the recognizer when it survived the call
pub struct RunFailure {
    pub error: DispatchError,

    /// `None` when the worker panicked or never ran
    pub recognizer: Option<Box<dyn Recognizer>>,
}

impl RunFailure {
    pub(crate) fn lost(error: DispatchError) -> Self {
        Self {
            error,
            recognizer: None,
        }
    }
}

impl fmt::Debug for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunFailure")
            .field("error", &self.error)
            .field("recognizer", &self.recognizer.is_some())
            .finish()
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
