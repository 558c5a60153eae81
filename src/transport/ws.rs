use super::{Frame, Transport};
use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket};
use std::net::SocketAddr;
use tracing::debug;

/// `Transport` over an upgraded axum WebSocket
pub struct WsTransport {
    socket: WebSocket,
    peer: SocketAddr,
}

impl WsTransport {
    pub fn new(socket: WebSocket, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn receive(&mut self) -> Option<Result<Frame>> {
        loop {
            let message = match self.socket.recv().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(anyhow::Error::new(e).context("WebSocket read failed"))),
            };

            match message {
                Message::Text(text) => return Some(Ok(Frame::Text(text))),
                Message::Binary(data) => return Some(Ok(Frame::Binary(data))),
                // Pings are answered by the WebSocket layer
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(frame) => {
                    debug!("Close frame from {}: {:?}", self.peer, frame);
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, payload: String) -> Result<()> {
        self.socket
            .send(Message::Text(payload))
            .await
            .context("WebSocket send failed")
    }

    async fn close(&mut self) -> Result<()> {
        self.socket
            .send(Message::Close(None))
            .await
            .context("WebSocket close failed")
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}
