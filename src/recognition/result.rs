use serde_json::Value;

/// What a recognition call produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Hypothesis for audio still being spoken
    Partial,
    /// A segment boundary was reached
    Segment,
    /// End-of-stream flush
    Final,
}

/// A result payload and the call that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognition {
    pub kind: ResultKind,
    /// Opaque payload from the engine, forwarded to the peer as-is
    pub payload: String,
}

impl Recognition {
    pub fn new(kind: ResultKind, payload: String) -> Self {
        Self { kind, payload }
    }
}

/// Check whether a JSON result payload holds a non-empty `"text"` field
///
/// Payloads that are not JSON objects, or carry no `text` string, count as empty.
pub fn carries_transcript(payload: &str) -> bool {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => map
            .get("text")
            .and_then(Value::as_str)
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false),
        _ => false,
    }
}
