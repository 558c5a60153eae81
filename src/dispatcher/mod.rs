//! Recognition dispatcher
//!
//! Runs recognizer calls on tokio's blocking pool, capped at a fixed number
//! of concurrent workers. Calls beyond the cap queue in arrival order; none
//! are dropped and none are retried.
//!
//! The recognizer travels into the worker by value and comes back with the
//! result, so a single recognizer can never be driven by two calls at once.

mod error;

pub use error::{DispatchError, RunFailure};

use crate::config::DispatcherConfig;
use crate::recognition::{
    Recognition, RecognitionModel, Recognizer, RecognizerOptions, ResultKind,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Work a session can submit for its recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionCall {
    /// Feed a waveform chunk, then fetch a segment or partial result
    Accept(Vec<u8>),
    /// Flush and fetch the final result
    Final,
}

/// Shared, cloneable handle to the worker pool
#[derive(Clone)]
pub struct Dispatcher {
    permits: Arc<Semaphore>,
    workers: usize,
    in_flight: Arc<AtomicUsize>,
}

impl Dispatcher {
    /// Create a dispatcher with `workers` concurrent recognition calls
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);

        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a dispatcher sized from configuration (0 = available parallelism)
    pub fn from_config(config: &DispatcherConfig) -> Self {
        let workers = if config.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            config.workers
        };

        Self::new(workers)
    }

    /// Maximum number of calls that execute at once
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Calls currently executing on a worker
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Create a recognizer on a worker thread
    pub async fn create(
        &self,
        model: Arc<dyn RecognitionModel>,
        options: RecognizerOptions,
    ) -> Result<Box<dyn Recognizer>, DispatchError> {
        self.execute(move || model.create_recognizer(&options)).await
    }

    /// Run one call against `recognizer` and hand it back with the result
    ///
    /// An engine error also hands the recognizer back; it is lost only when
    /// the worker itself fails.
    pub async fn run(
        &self,
        recognizer: Box<dyn Recognizer>,
        call: RecognitionCall,
    ) -> Result<(Box<dyn Recognizer>, Recognition), RunFailure> {
        let (recognizer, outcome) = self
            .execute(move || {
                let mut recognizer = recognizer;
                let outcome = apply(recognizer.as_mut(), call);
                Ok((recognizer, outcome))
            })
            .await
            .map_err(RunFailure::lost)?;

        match outcome {
            Ok(recognition) => Ok((recognizer, recognition)),
            Err(e) => Err(RunFailure {
                error: DispatchError::Engine(e),
                recognizer: Some(recognizer),
            }),
        }
    }

    async fn execute<F, T>(&self, work: F) -> Result<T, DispatchError>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::PoolClosed)?;

        let in_flight = Arc::clone(&self.in_flight);
        let running = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Recognition call started ({}/{} workers busy)", running, self.workers);

        let handle = tokio::task::spawn_blocking(move || {
            let outcome = work();
            in_flight.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
            outcome
        });

        match handle.await {
            Ok(outcome) => outcome.map_err(DispatchError::Engine),
            Err(e) => {
                // The closure never reached its decrement
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Err(DispatchError::WorkerPanicked(e.to_string()))
            }
        }
    }
}

fn apply(recognizer: &mut dyn Recognizer, call: RecognitionCall) -> anyhow::Result<Recognition> {
    let recognition = match call {
        RecognitionCall::Accept(data) => {
            if recognizer.accept_waveform(&data)? {
                Recognition::new(ResultKind::Segment, recognizer.result()?)
            } else {
                Recognition::new(ResultKind::Partial, recognizer.partial_result()?)
            }
        }
        RecognitionCall::Final => Recognition::new(ResultKind::Final, recognizer.final_result()?),
    };

    Ok(recognition)
}
