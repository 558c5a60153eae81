use anyhow::Result;

use super::result::carries_transcript;

/// Parameters latched when a recognizer is created
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognizerOptions {
    /// Sample rate of the incoming waveform in Hz
    pub sample_rate: f32,
    /// Whether the engine should emit word-level timings
    pub words: bool,
}

impl Default for RecognizerOptions {
    fn default() -> Self {
        Self {
            sample_rate: 8000.0,
            words: true,
        }
    }
}

/// A loaded recognition model
///
/// The model is shared by every session and is immutable after load.
/// Implementations must be safe to call from several worker threads.
pub trait RecognitionModel: Send + Sync {
    /// Create a fresh recognizer bound to this model
    fn create_recognizer(&self, options: &RecognizerOptions) -> Result<Box<dyn Recognizer>>;

    /// Get model name for logging
    fn name(&self) -> &str;
}

/// Per-session recognition state
///
/// Every method may block on CPU-bound work, so callers go through the
/// [`Dispatcher`](crate::dispatcher::Dispatcher) rather than calling these
/// on the connection task. A recognizer is never used by two calls at once.
pub trait Recognizer: Send {
    /// Feed a waveform chunk
    ///
    /// Returns `true` when the chunk completed a segment and [`result`](Self::result)
    /// holds the segment transcript.
    fn accept_waveform(&mut self, data: &[u8]) -> Result<bool>;

    /// Hypothesis for the segment in progress
    fn partial_result(&mut self) -> Result<String>;

    /// Transcript of the segment that just ended
    fn result(&mut self) -> Result<String>;

    /// Flush remaining audio and return the last transcript
    fn final_result(&mut self) -> Result<String>;

    /// Whether a result payload carries recognized text
    fn has_transcript(&self, payload: &str) -> bool {
        carries_transcript(payload)
    }
}
