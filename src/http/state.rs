use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::recognition::RecognitionModel;
use crate::session::SessionConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Shared application state for the listener and its sessions
///
/// Everything here is immutable after startup or safe for concurrent use.
#[derive(Clone)]
pub struct AppState {
    /// Loaded recognition model, shared by every session
    pub model: Arc<dyn RecognitionModel>,

    /// Recognition worker pool
    pub dispatcher: Dispatcher,

    /// Settings applied to every new session
    pub session_config: Arc<SessionConfig>,

    /// Admission control (None = unbounded)
    pub connection_limit: Option<Arc<Semaphore>>,

    /// Cancelled on server shutdown; sessions hold child tokens
    pub shutdown: CancellationToken,

    /// Running session tasks, awaited on shutdown
    pub sessions: TaskTracker,

    active_sessions: Arc<AtomicUsize>,
    total_sessions: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(
        model: Arc<dyn RecognitionModel>,
        dispatcher: Dispatcher,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            model,
            dispatcher,
            session_config: Arc::new(session_config),
            connection_limit: None,
            shutdown: CancellationToken::new(),
            sessions: TaskTracker::new(),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            total_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Build state from startup configuration
    pub fn from_config(cfg: &Config, model: Arc<dyn RecognitionModel>) -> Self {
        Self::new(model, Dispatcher::from_config(&cfg.dispatcher), SessionConfig::from(cfg))
            .with_max_connections(cfg.server.max_connections)
    }

    /// Cap the number of concurrent sessions
    pub fn with_max_connections(mut self, max: Option<usize>) -> Self {
        self.connection_limit = max.map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    /// Reserve a session slot
    ///
    /// Returns `Err(())` when the limit is reached; `Ok(None)` when unbounded.
    #[allow(clippy::result_unit_err)]
    pub fn try_admit(&self) -> Result<Option<OwnedSemaphorePermit>, ()> {
        match &self.connection_limit {
            Some(limit) => Arc::clone(limit)
                .try_acquire_owned()
                .map(Some)
                .map_err(|_| ()),
            None => Ok(None),
        }
    }

    /// Record a session start; returns the number of live sessions
    pub fn session_started(&self) -> usize {
        self.total_sessions.fetch_add(1, Ordering::SeqCst);
        self.active_sessions.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record a session end; returns the number of live sessions
    pub fn session_finished(&self) -> usize {
        self.active_sessions.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    pub fn total_sessions(&self) -> usize {
        self.total_sessions.load(Ordering::SeqCst)
    }
}
