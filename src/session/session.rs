use super::config::SessionConfig;
use super::message::{classify, Message};
use super::stats::{ExitReason, SessionStats};
use super::watchdog::{ActivityClock, Watchdog};
use crate::dispatcher::{DispatchError, Dispatcher, RecognitionCall};
use crate::recognition::{
    carries_transcript, Recognition, RecognitionModel, Recognizer, RecognizerOptions,
};
use crate::transport::Transport;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Protocol state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No recognizer yet; config messages still change the sample rate
    Init,
    /// Recognizer created, audio streaming
    Active,
    /// EOF seen or the loop is exiting
    Finalizing,
    /// Teardown finished
    Closed,
}

/// Outcome of handling one message
enum Step {
    Continue,
    Exit(ExitReason),
}

/// Why a dispatcher call did not complete
enum Halt {
    /// The session was told to close while the call was pending
    Closed(ExitReason),
    Failed(DispatchError),
}

/// One client connection running the streaming recognition protocol
pub struct Session<T: Transport> {
    id: String,
    transport: T,
    model: Arc<dyn RecognitionModel>,
    dispatcher: Dispatcher,
    config: SessionConfig,

    /// Latched into the recognizer when it is created
    sample_rate: f32,

    /// Created on the first audio or EOF message, never replaced
    recognizer: Option<Box<dyn Recognizer>>,

    state: SessionState,

    /// Set once a final result has been requested
    finalized: bool,

    activity: Arc<ActivityClock>,

    /// Cancelled by the idle watchdog
    closing: CancellationToken,

    /// Cancelled when the server shuts down
    shutdown: CancellationToken,

    stats: SessionStats,
}

impl<T: Transport> Session<T> {
    pub fn new(
        transport: T,
        model: Arc<dyn RecognitionModel>,
        dispatcher: Dispatcher,
        config: SessionConfig,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let stats = SessionStats::new(id.clone(), transport.peer());

        Self {
            id,
            transport,
            model,
            dispatcher,
            sample_rate: config.recognizer.sample_rate,
            config,
            recognizer: None,
            state: SessionState::Init,
            finalized: false,
            activity: Arc::new(ActivityClock::new()),
            closing: CancellationToken::new(),
            shutdown: CancellationToken::new(),
            stats,
        }
    }

    /// Close this session when `shutdown` is cancelled
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!("Session {}: {:?} -> {:?}", self.id, self.state, next);
            self.state = next;
            self.stats.states.push(next);
        }
    }

    /// Run the protocol until the connection ends
    ///
    /// Never fails; every exit path goes through the same teardown and the
    /// returned statistics record how the session ended.
    pub async fn run(mut self) -> SessionStats {
        info!("New connection {} from {}", self.id, self.stats.peer);

        let watchdog = Watchdog::spawn(
            self.id.clone(),
            Arc::clone(&self.activity),
            self.closing.clone(),
            self.config.poll_interval,
            self.config.idle_timeout,
        );

        let exit = self.message_loop().await;

        self.teardown(watchdog, exit).await
    }

    async fn message_loop(&mut self) -> ExitReason {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.closing.cancelled() => return ExitReason::IdleTimeout,
                _ = self.shutdown.cancelled() => return ExitReason::Shutdown,
                received = self.transport.receive() => received,
            };

            let frame = match received {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    info!("Connection {} failed: {:#}", self.id, e);
                    return ExitReason::TransportError;
                }
                None => {
                    info!("Client {} closed connection", self.stats.peer);
                    return ExitReason::PeerClosed;
                }
            };

            self.activity.touch();

            if let Step::Exit(reason) = self.handle(classify(frame)).await {
                return reason;
            }
        }
    }

    async fn handle(&mut self, message: Message) -> Step {
        match message {
            Message::Config { sample_rate } => {
                self.stats.config_messages += 1;
                self.apply_config(sample_rate);
                Step::Continue
            }
            Message::MalformedConfig { reason } => {
                self.stats.config_messages += 1;
                debug!("Invalid config on session {}: {}", self.id, reason);
                Step::Continue
            }
            Message::Audio(data) => self.process_audio(data).await,
            Message::Eof => self.finish_stream().await,
        }
    }

    fn apply_config(&mut self, sample_rate: Option<f32>) {
        debug!("Received config on session {}: sample_rate={:?}", self.id, sample_rate);

        if self.state != SessionState::Init {
            debug!(
                "Recognizer already running at {} Hz, config on session {} ignored",
                self.sample_rate, self.id
            );
            return;
        }

        if let Some(rate) = sample_rate {
            self.sample_rate = rate;
        }
    }

    async fn process_audio(&mut self, data: Vec<u8>) -> Step {
        self.stats.audio_chunks += 1;
        self.stats.bytes_received += data.len();

        let recognition = match self.recognize(RecognitionCall::Accept(data)).await {
            Ok(recognition) => recognition,
            Err(halt) => return Step::Exit(self.halt_reason(halt)),
        };

        trace!("Session {} {:?}: {}", self.id, recognition.kind, recognition.payload);

        match self.transport.send(recognition.payload).await {
            Ok(()) => {
                self.stats.results_sent += 1;
                Step::Continue
            }
            Err(e) => {
                info!("Result send failed on session {}: {:#}", self.id, e);
                Step::Exit(ExitReason::TransportError)
            }
        }
    }

    async fn finish_stream(&mut self) -> Step {
        info!("EOF received from {}", self.stats.peer);

        self.finalized = true;
        let outcome = self.recognize(RecognitionCall::Final).await;
        self.transition(SessionState::Finalizing);

        match outcome {
            Ok(recognition) => {
                self.deliver_final(recognition.payload).await;
                Step::Exit(ExitReason::Eof)
            }
            Err(halt) => Step::Exit(self.halt_reason(halt)),
        }
    }

    /// Run a call on the session's recognizer, creating it first if needed
    async fn recognize(&mut self, call: RecognitionCall) -> Result<Recognition, Halt> {
        let recognizer = self.take_recognizer().await?;

        let outcome = until_closed(
            &self.closing,
            &self.shutdown,
            self.dispatcher.run(recognizer, call),
        )
        .await?;

        match outcome {
            Ok((recognizer, recognition)) => {
                self.recognizer = Some(recognizer);
                Ok(recognition)
            }
            Err(failure) => {
                // Kept for the teardown final
                self.recognizer = failure.recognizer;
                Err(Halt::Failed(failure.error))
            }
        }
    }

    async fn take_recognizer(&mut self) -> Result<Box<dyn Recognizer>, Halt> {
        if let Some(recognizer) = self.recognizer.take() {
            return Ok(recognizer);
        }

        if self.state != SessionState::Init {
            // Lost to an earlier failed or abandoned call; never recreated
            return Err(Halt::Failed(DispatchError::Engine(anyhow::anyhow!(
                "recognizer is no longer available"
            ))));
        }

        let options = RecognizerOptions {
            sample_rate: self.sample_rate,
            words: self.config.recognizer.words,
        };

        let recognizer = until_closed(
            &self.closing,
            &self.shutdown,
            self.dispatcher.create(Arc::clone(&self.model), options),
        )
        .await?
        .map_err(Halt::Failed)?;

        self.transition(SessionState::Active);
        info!(
            "Recognizer created for session {} at {} Hz",
            self.id, self.sample_rate
        );

        Ok(recognizer)
    }

    /// Send a final result if it carries recognized text; failures are logged only
    async fn deliver_final(&mut self, payload: String) {
        let has_text = match &self.recognizer {
            Some(recognizer) => recognizer.has_transcript(&payload),
            None => carries_transcript(&payload),
        };

        if !has_text {
            debug!("Empty final result on session {} suppressed", self.id);
            return;
        }

        trace!("Session {} final: {}", self.id, payload);

        match self.transport.send(payload).await {
            Ok(()) => {
                self.stats.results_sent += 1;
                self.stats.final_sent = true;
            }
            Err(e) => info!("Final result send failed on session {}: {:#}", self.id, e),
        }
    }

    fn halt_reason(&self, halt: Halt) -> ExitReason {
        match halt {
            Halt::Closed(reason) => {
                debug!("Session {} closed during a recognition call", self.id);
                reason
            }
            Halt::Failed(e) => {
                warn!("Recognition failed on session {}: {}", self.id, e);
                ExitReason::RecognitionFailed
            }
        }
    }

    /// Runs exactly once, whatever ended the message loop
    async fn teardown(mut self, watchdog: Watchdog, exit: ExitReason) -> SessionStats {
        watchdog.stop().await;
        self.transition(SessionState::Finalizing);

        if !self.finalized {
            if let Some(recognizer) = self.recognizer.take() {
                self.finalized = true;

                let pending = self.dispatcher.run(recognizer, RecognitionCall::Final);
                let outcome = tokio::time::timeout(self.config.finalize_timeout, pending).await;

                match outcome {
                    Ok(Ok((recognizer, recognition))) => {
                        self.recognizer = Some(recognizer);
                        self.deliver_final(recognition.payload).await;
                    }
                    Ok(Err(failure)) => {
                        self.recognizer = failure.recognizer;
                        warn!("Final result failed on session {}: {}", self.id, failure.error);
                    }
                    Err(_) => warn!(
                        "Final result on session {} timed out after {:?}",
                        self.id, self.config.finalize_timeout
                    ),
                }
            }
        }

        match self.transport.close().await {
            Ok(()) => debug!("Connection {} closed by server", self.id),
            Err(e) => debug!("Close on session {} failed: {:#}", self.id, e),
        }

        self.recognizer = None;
        self.transition(SessionState::Closed);

        let elapsed = Utc::now().signed_duration_since(self.stats.started_at);
        self.stats.duration_secs = elapsed.num_milliseconds() as f64 / 1000.0;
        self.stats.exit = Some(exit);

        info!(
            "Connection from {} closed ({:?}, {} chunks, {} results sent)",
            self.stats.peer, exit, self.stats.audio_chunks, self.stats.results_sent
        );

        self.stats
    }
}

/// Await `work` unless the session is told to close first
async fn until_closed<F: Future>(
    closing: &CancellationToken,
    shutdown: &CancellationToken,
    work: F,
) -> Result<F::Output, Halt> {
    tokio::select! {
        biased;
        _ = closing.cancelled() => Err(Halt::Closed(ExitReason::IdleTimeout)),
        _ = shutdown.cancelled() => Err(Halt::Closed(ExitReason::Shutdown)),
        output = work => Ok(output),
    }
}
