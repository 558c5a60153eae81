//! Connection transport seam
//!
//! Sessions talk to their peer through the `Transport` trait so the
//! protocol can run over a WebSocket in production and over in-memory
//! channels in tests.

mod ws;

pub use ws::WsTransport;

use anyhow::Result;

/// A data frame received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Bidirectional message transport for one connection
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Wait for the next data frame
    ///
    /// Returns `None` once the connection is closed. Must be cancel-safe:
    /// the session races it against the idle watchdog.
    async fn receive(&mut self) -> Option<Result<Frame>>;

    /// Send a text payload to the peer
    async fn send(&mut self, payload: String) -> Result<()>;

    /// Close the connection
    async fn close(&mut self) -> Result<()>;

    /// Peer description for logging
    fn peer(&self) -> String;
}
