//! Streaming recognition sessions
//!
//! This module provides the per-connection `Session` that:
//! - Classifies inbound frames into config, audio and EOF messages
//! - Creates the recognizer lazily and drives it through the dispatcher
//! - Runs an idle watchdog alongside the message loop
//! - Flushes a final result at most once, however the connection ends

mod config;
pub mod message;
mod session;
mod stats;
pub mod watchdog;

pub use config::SessionConfig;
pub use message::{classify, Message, EOF_SENTINEL};
pub use session::{Session, SessionState};
pub use stats::{ExitReason, SessionStats};
pub use watchdog::{ActivityClock, Watchdog};
