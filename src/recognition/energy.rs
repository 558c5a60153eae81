//! Built-in energy segmenter
//!
//! A dependency-free engine that splits 16-bit little-endian mono PCM into
//! speech segments by RMS energy. It reports segment boundaries and speech
//! durations but never recognizes words, so its payloads always carry an
//! empty `text` field. Useful for exercising the gateway protocol without a
//! real acoustic model.

use super::model::{RecognitionModel, Recognizer, RecognizerOptions};
use anyhow::{ensure, Result};
use serde_json::json;

/// RMS level (in i16 units) above which a chunk counts as voiced
const VOICE_THRESHOLD: f64 = 500.0;

/// Minimum voiced duration before a segment can close
const MIN_SPEECH_MS: f64 = 200.0;

/// Trailing silence that closes a segment
const SEGMENT_SILENCE_MS: f64 = 500.0;

/// Model handle for the energy segmenter
#[derive(Debug, Default)]
pub struct EnergyModel;

impl EnergyModel {
    pub fn new() -> Self {
        Self
    }
}

impl RecognitionModel for EnergyModel {
    fn create_recognizer(&self, options: &RecognizerOptions) -> Result<Box<dyn Recognizer>> {
        ensure!(
            options.sample_rate.is_finite() && options.sample_rate > 0.0,
            "Invalid sample rate: {}",
            options.sample_rate
        );

        Ok(Box::new(EnergyRecognizer::new(options.sample_rate)))
    }

    fn name(&self) -> &str {
        "energy"
    }
}

/// Per-session segmenter state
#[derive(Debug)]
pub struct EnergyRecognizer {
    sample_rate: f64,
    /// Odd byte left over from the previous chunk
    carry: Option<u8>,
    /// Voiced audio in the open segment
    voiced_ms: f64,
    /// Silence since the last voiced chunk of the open segment
    silence_ms: f64,
    /// Voiced duration of the segment that last closed
    last_segment_ms: f64,
}

impl EnergyRecognizer {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate: f64::from(sample_rate),
            carry: None,
            voiced_ms: 0.0,
            silence_ms: 0.0,
            last_segment_ms: 0.0,
        }
    }

    /// Decode PCM bytes, joining an odd trailing byte with the next chunk
    fn decode(&mut self, data: &[u8]) -> Vec<i16> {
        let mut bytes = Vec::with_capacity(data.len() + 1);
        if let Some(b) = self.carry.take() {
            bytes.push(b);
        }
        bytes.extend_from_slice(data);

        if bytes.len() % 2 == 1 {
            self.carry = bytes.pop();
        }

        bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    fn segment_payload(speech_ms: f64) -> String {
        json!({ "text": "", "speech_ms": speech_ms.round() as u64 }).to_string()
    }
}

impl Recognizer for EnergyRecognizer {
    fn accept_waveform(&mut self, data: &[u8]) -> Result<bool> {
        let samples = self.decode(data);
        if samples.is_empty() {
            return Ok(false);
        }

        let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
        let rms = (sum_sq / samples.len() as f64).sqrt();
        let duration_ms = samples.len() as f64 * 1000.0 / self.sample_rate;

        if rms >= VOICE_THRESHOLD {
            self.voiced_ms += duration_ms;
            self.silence_ms = 0.0;
        } else if self.voiced_ms > 0.0 {
            self.silence_ms += duration_ms;
        }

        if self.voiced_ms >= MIN_SPEECH_MS && self.silence_ms >= SEGMENT_SILENCE_MS {
            self.last_segment_ms = self.voiced_ms;
            self.voiced_ms = 0.0;
            self.silence_ms = 0.0;
            return Ok(true);
        }

        Ok(false)
    }

    fn partial_result(&mut self) -> Result<String> {
        Ok(json!({ "partial": "" }).to_string())
    }

    fn result(&mut self) -> Result<String> {
        Ok(Self::segment_payload(self.last_segment_ms))
    }

    fn final_result(&mut self) -> Result<String> {
        let speech_ms = self.voiced_ms;
        self.voiced_ms = 0.0;
        self.silence_ms = 0.0;
        self.carry = None;
        Ok(Self::segment_payload(speech_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(value: i16, samples: usize) -> Vec<u8> {
        std::iter::repeat(value)
            .take(samples)
            .flat_map(|s| s.to_le_bytes())
            .collect()
    }

    #[test]
    fn test_silence_never_closes_a_segment() {
        let mut rec = EnergyRecognizer::new(8000.0);
        for _ in 0..20 {
            assert!(!rec.accept_waveform(&pcm(0, 800)).unwrap());
        }
    }

    #[test]
    fn test_speech_then_silence_reports_boundary() {
        let mut rec = EnergyRecognizer::new(8000.0);

        // 300ms of speech
        assert!(!rec.accept_waveform(&pcm(4000, 2400)).unwrap());
        // 400ms of silence is not enough
        assert!(!rec.accept_waveform(&pcm(0, 3200)).unwrap());
        // another 100ms closes the segment
        assert!(rec.accept_waveform(&pcm(0, 800)).unwrap());

        let result: serde_json::Value = serde_json::from_str(&rec.result().unwrap()).unwrap();
        assert_eq!(result["text"], "");
        assert_eq!(result["speech_ms"], 300);
    }

    #[test]
    fn test_odd_chunks_are_joined() {
        let mut rec = EnergyRecognizer::new(8000.0);
        let bytes = pcm(4000, 4);

        rec.accept_waveform(&bytes[..3]).unwrap();
        rec.accept_waveform(&bytes[3..]).unwrap();

        let result: serde_json::Value = serde_json::from_str(&rec.final_result().unwrap()).unwrap();
        // 4 samples at 8kHz is half a millisecond
        assert_eq!(result["speech_ms"], 1);
    }

    #[test]
    fn test_final_result_has_no_transcript() {
        let mut rec = EnergyRecognizer::new(16000.0);
        rec.accept_waveform(&pcm(4000, 16000)).unwrap();

        let payload = rec.final_result().unwrap();
        assert!(!rec.has_transcript(&payload));
    }

    #[test]
    fn test_invalid_sample_rate_rejected() {
        let model = EnergyModel::new();
        let options = RecognizerOptions {
            sample_rate: 0.0,
            words: false,
        };
        assert!(model.create_recognizer(&options).is_err());
    }
}
