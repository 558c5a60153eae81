use crate::transport::Frame;
use serde_json::Value;

/// End-of-stream sentinel, compared after trimming whitespace
pub const EOF_SENTINEL: &str = r#"{"eof" : 1}"#;

/// Text frames containing this keyword are treated as control messages
const CONFIG_MARKER: &str = "config";

/// Binary frames longer than this cannot be the sentinel
const MAX_SENTINEL_FRAME: usize = 64;

/// An inbound frame, classified
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Control message; `sample_rate` is set when the client supplied one
    Config { sample_rate: Option<f32> },
    /// Control message that could not be used
    MalformedConfig { reason: String },
    /// Waveform data
    Audio(Vec<u8>),
    /// End of stream
    Eof,
}

/// Classify a received frame
///
/// The EOF sentinel is checked first, then the config marker (text only).
/// Everything else is audio.
pub fn classify(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => {
            if text.trim() == EOF_SENTINEL {
                Message::Eof
            } else if text.contains(CONFIG_MARKER) {
                parse_config(&text)
            } else {
                Message::Audio(text.into_bytes())
            }
        }
        Frame::Binary(data) => {
            if is_binary_sentinel(&data) {
                Message::Eof
            } else {
                Message::Audio(data)
            }
        }
    }
}

fn is_binary_sentinel(data: &[u8]) -> bool {
    data.len() <= MAX_SENTINEL_FRAME
        && std::str::from_utf8(data)
            .map(|text| text.trim() == EOF_SENTINEL)
            .unwrap_or(false)
}

fn parse_config(text: &str) -> Message {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return Message::MalformedConfig {
                reason: format!("invalid JSON: {}", e),
            }
        }
    };

    let Some(config) = value.get("config").and_then(Value::as_object) else {
        return Message::MalformedConfig {
            reason: "missing \"config\" object".to_string(),
        };
    };

    match config.get("sample_rate") {
        None => Message::Config { sample_rate: None },
        Some(raw) => match coerce_sample_rate(raw) {
            Some(rate) => Message::Config {
                sample_rate: Some(rate),
            },
            None => Message::MalformedConfig {
                reason: format!("unusable sample_rate: {}", raw),
            },
        },
    }
}

/// Accept JSON numbers and numeric strings; rates must be positive and finite
fn coerce_sample_rate(raw: &Value) -> Option<f32> {
    let rate = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    let rate = rate as f32;
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
