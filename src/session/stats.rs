use super::session::SessionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Client sent the EOF sentinel
    Eof,
    /// Client closed the connection
    PeerClosed,
    /// Reading from or writing to the connection failed
    TransportError,
    /// The idle watchdog closed the connection
    IdleTimeout,
    /// The recognition engine failed
    RecognitionFailed,
    /// The server is shutting down
    Shutdown,
}

/// Statistics about a finished (or running) session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// Remote address of the peer
    pub peer: String,

    /// When the connection was accepted
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Audio chunks passed to the recognizer
    pub audio_chunks: usize,

    /// Audio bytes received
    pub bytes_received: usize,

    /// Config messages received (well-formed or not)
    pub config_messages: usize,

    /// Result payloads delivered to the peer, final included
    pub results_sent: usize,

    /// Whether a final result with text was delivered
    pub final_sent: bool,

    /// How the session ended, once it has
    pub exit: Option<ExitReason>,

    /// States entered after `Init`, in order
    pub states: Vec<SessionState>,
}

impl SessionStats {
    pub fn new(session_id: String, peer: String) -> Self {
        Self {
            session_id,
            peer,
            started_at: Utc::now(),
            duration_secs: 0.0,
            audio_chunks: 0,
            bytes_received: 0,
            config_messages: 0,
            results_sent: 0,
            final_sent: false,
            exit: None,
            states: Vec::new(),
        }
    }
}
