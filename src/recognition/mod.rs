//! Recognition capability
//!
//! This module defines the engine-facing traits the gateway drives:
//! - `RecognitionModel` - process-wide, immutable after load
//! - `Recognizer` - per-session state, created lazily by the session
//!
//! It also provides the built-in `energy` engine and the transcript check
//! used to suppress empty final results.

pub mod energy;
mod model;
mod result;

pub use energy::EnergyModel;
pub use model::{RecognitionModel, Recognizer, RecognizerOptions};
pub use result::{carries_transcript, Recognition, ResultKind};

use crate::config::RecognizerConfig;
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Engines that can be selected with `recognizer.engine`
pub const SUPPORTED_ENGINES: &[&str] = &["energy"];

/// Load the configured recognition model
pub fn load_model(config: &RecognizerConfig) -> Result<Arc<dyn RecognitionModel>> {
    let started = Instant::now();

    let model: Arc<dyn RecognitionModel> = match config.engine.as_str() {
        "energy" => {
            info!(
                "Energy engine selected, model path {} is not used",
                config.model_path
            );
            Arc::new(EnergyModel::new())
        }
        other => bail!(
            "Unknown recognition engine '{}' (supported: {})",
            other,
            SUPPORTED_ENGINES.join(", ")
        ),
    };

    info!(
        "Model '{}' loaded in {:.2} seconds",
        model.name(),
        started.elapsed().as_secs_f64()
    );

    Ok(model)
}
