// Shared helpers for session and gateway tests
//
// ScriptedModel is a deterministic engine: every UTF-8 audio chunk is a
// "word", a chunk starting with '!' closes a segment, "fail" makes the
// engine error and "slow" blocks the worker for half a second.
//
// ChannelTransport runs a session over in-memory channels; the test drives
// the other end through a Peer.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use asr_gateway::{Frame, RecognitionModel, Recognizer, RecognizerOptions, Transport};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Scripted engine
// ============================================================================

/// Observations shared by a model and every recognizer it creates
#[derive(Default)]
pub struct Recorder {
    pub created: Mutex<Vec<RecognizerOptions>>,
    pub accept_calls: AtomicUsize,
    pub final_calls: AtomicUsize,
    busy: AtomicBool,
    pub overlapped: AtomicBool,
}

impl Recorder {
    pub fn created(&self) -> Vec<RecognizerOptions> {
        self.created.lock().unwrap().clone()
    }

    pub fn final_calls(&self) -> usize {
        self.final_calls.load(Ordering::SeqCst)
    }

    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
    }

    fn leave(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

pub struct ScriptedModel {
    pub recorder: Arc<Recorder>,
}

impl ScriptedModel {
    pub fn new() -> (Arc<dyn RecognitionModel>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let model = Arc::new(Self {
            recorder: Arc::clone(&recorder),
        });
        (model, recorder)
    }
}

impl RecognitionModel for ScriptedModel {
    fn create_recognizer(&self, options: &RecognizerOptions) -> Result<Box<dyn Recognizer>> {
        self.recorder.created.lock().unwrap().push(*options);
        Ok(Box::new(ScriptedRecognizer {
            recorder: Arc::clone(&self.recorder),
            pending: Vec::new(),
            segment: String::new(),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct ScriptedRecognizer {
    recorder: Arc<Recorder>,
    pending: Vec<String>,
    segment: String,
}

impl Recognizer for ScriptedRecognizer {
    fn accept_waveform(&mut self, data: &[u8]) -> Result<bool> {
        self.recorder.enter();
        self.recorder.accept_calls.fetch_add(1, Ordering::SeqCst);
        // Long enough for concurrent misuse to be noticed
        std::thread::sleep(Duration::from_millis(2));

        let outcome = match data {
            b"fail" => Err(anyhow!("scripted engine failure")),
            b"slow" => {
                std::thread::sleep(Duration::from_millis(500));
                Ok(false)
            }
            _ => {
                let text = String::from_utf8_lossy(data).trim().to_string();
                match text.strip_prefix('!') {
                    Some(rest) => {
                        if !rest.is_empty() {
                            self.pending.push(rest.to_string());
                        }
                        self.segment = self.pending.join(" ");
                        self.pending.clear();
                        Ok(true)
                    }
                    None => {
                        if !text.is_empty() {
                            self.pending.push(text);
                        }
                        Ok(false)
                    }
                }
            }
        };

        self.recorder.leave();
        outcome
    }

    fn partial_result(&mut self) -> Result<String> {
        Ok(format!(r#"{{"partial" : "{}"}}"#, self.pending.join(" ")))
    }

    fn result(&mut self) -> Result<String> {
        Ok(format!(r#"{{"text" : "{}"}}"#, self.segment))
    }

    fn final_result(&mut self) -> Result<String> {
        self.recorder.final_calls.fetch_add(1, Ordering::SeqCst);
        let text = self.pending.join(" ");
        self.pending.clear();
        Ok(format!(r#"{{"text" : "{}"}}"#, text))
    }
}

// ============================================================================
// In-memory transport
// ============================================================================

/// Something the peer does to the connection
pub enum Inbound {
    Frame(Frame),
    Error(String),
    Close,
}

/// Something the server did to the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Closed,
}

#[derive(Default)]
pub struct Faults {
    pub fail_sends: AtomicBool,
    pub fail_close: AtomicBool,
    pub close_calls: AtomicUsize,
}

pub struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: mpsc::UnboundedSender<Outbound>,
    faults: Arc<Faults>,
}

/// Test-side end of a `ChannelTransport`
pub struct Peer {
    tx: mpsc::UnboundedSender<Inbound>,
    rx: mpsc::UnboundedReceiver<Outbound>,
    pub faults: Arc<Faults>,
}

pub fn channel_transport() -> (ChannelTransport, Peer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let faults = Arc::new(Faults::default());

    (
        ChannelTransport {
            inbound: in_rx,
            outbound: out_tx,
            faults: Arc::clone(&faults),
        },
        Peer {
            tx: in_tx,
            rx: out_rx,
            faults,
        },
    )
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn receive(&mut self) -> Option<Result<Frame>> {
        match self.inbound.recv().await? {
            Inbound::Frame(frame) => Some(Ok(frame)),
            Inbound::Error(reason) => Some(Err(anyhow!(reason))),
            Inbound::Close => None,
        }
    }

    async fn send(&mut self, payload: String) -> Result<()> {
        if self.faults.fail_sends.load(Ordering::SeqCst) {
            bail!("peer is gone");
        }
        self.outbound
            .send(Outbound::Text(payload))
            .map_err(|_| anyhow!("peer is gone"))
    }

    async fn close(&mut self) -> Result<()> {
        self.faults.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_close.load(Ordering::SeqCst) {
            bail!("already closed");
        }
        let _ = self.outbound.send(Outbound::Closed);
        Ok(())
    }

    fn peer(&self) -> String {
        "channel-peer".to_string()
    }
}

impl Peer {
    pub fn text(&self, text: &str) {
        self.push(Inbound::Frame(Frame::Text(text.to_string())));
    }

    pub fn audio(&self, data: &[u8]) {
        self.push(Inbound::Frame(Frame::Binary(data.to_vec())));
    }

    pub fn eof(&self) {
        self.text(r#"{"eof" : 1}"#);
    }

    pub fn fail(&self, reason: &str) {
        self.push(Inbound::Error(reason.to_string()));
    }

    pub fn close(&self) {
        self.push(Inbound::Close);
    }

    fn push(&self, inbound: Inbound) {
        // The session may already be gone; that is what some tests check
        let _ = self.tx.send(inbound);
    }

    /// Next thing the server did
    pub async fn next(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }

    /// Everything the server did until it closed the connection
    pub async fn drain(&mut self) -> Vec<Outbound> {
        let mut seen = Vec::new();
        while let Some(event) = self.rx.recv().await {
            let closed = event == Outbound::Closed;
            seen.push(event);
            if closed {
                break;
            }
        }
        seen
    }
}

pub fn text(payload: &str) -> Outbound {
    Outbound::Text(payload.to_string())
}
