use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::recognition::SUPPORTED_ENGINES;

/// Config file loaded when `--config` is not given (extension resolved by the `config` crate)
pub const DEFAULT_CONFIG_PATH: &str = "config/asr-gateway";

/// Prefix for environment overrides, e.g. `ASR_GATEWAY__SERVER__PORT=2800`
pub const ENV_PREFIX: &str = "ASR_GATEWAY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub recognizer: RecognizerConfig,
    pub session: SessionTimeouts,
    pub dispatcher: DispatcherConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub interface: String,
    pub port: u16,
    /// Upper bound on concurrent sessions (unset = unbounded)
    pub max_connections: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interface: "0.0.0.0".to_string(),
            port: 2700,
            max_connections: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub engine: String,
    pub model_path: String,
    /// Sample rate used until a client sends a config message
    pub sample_rate: f32,
    /// Ask the engine for word-level timings
    pub words: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            engine: "energy".to_string(),
            model_path: "/opt/vosk-server/model".to_string(),
            sample_rate: 8000.0,
            words: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionTimeouts {
    /// How often the idle watchdog wakes up
    pub poll_interval_ms: u64,
    /// Silence after which the server closes the connection
    pub idle_timeout_ms: u64,
    /// Upper bound on the teardown final-result call
    pub finalize_timeout_ms: u64,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            idle_timeout_ms: 15_000,
            finalize_timeout_ms: 5_000,
        }
    }
}

impl SessionTimeouts {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_millis(self.finalize_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Recognition worker count (0 = available parallelism)
    pub workers: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. "info" or "asr_gateway=debug"
    pub level: Option<String>,
}

/// Command-line overrides, applied on top of file and environment values
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CliOverrides {
    /// Interface to listen on
    #[arg(long)]
    pub interface: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the recognition model
    #[arg(long)]
    pub model_path: Option<String>,

    /// Default sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<f32>,

    /// Log filter directive (overrides LOGGER tiers)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration from defaults, an optional file, the environment and CLI flags
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&str>, overrides: &CliOverrides) -> Result<Self> {
        let file = config::File::with_name(path.unwrap_or(DEFAULT_CONFIG_PATH))
            .required(path.is_some());

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .set_override_option("server.interface", overrides.interface.clone())?
            .set_override_option("server.port", overrides.port.map(i64::from))?
            .set_override_option("recognizer.model_path", overrides.model_path.clone())?
            .set_override_option("recognizer.sample_rate", overrides.sample_rate.map(f64::from))?
            .set_override_option("log.level", overrides.log_level.clone())?
            .build()
            .context("Failed to read configuration")?;

        let cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Reject values the gateway cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(self.server.port != 0, "server.port must be non-zero");
        ensure!(
            self.recognizer.sample_rate.is_finite() && self.recognizer.sample_rate > 0.0,
            "recognizer.sample_rate must be positive, got {}",
            self.recognizer.sample_rate
        );
        ensure!(
            SUPPORTED_ENGINES.contains(&self.recognizer.engine.as_str()),
            "Unknown recognition engine '{}' (supported: {})",
            self.recognizer.engine,
            SUPPORTED_ENGINES.join(", ")
        );
        ensure!(
            self.session.poll_interval_ms > 0,
            "session.poll_interval_ms must be non-zero"
        );
        ensure!(
            self.session.idle_timeout_ms >= self.session.poll_interval_ms,
            "session.idle_timeout_ms ({}) must not be shorter than session.poll_interval_ms ({})",
            self.session.idle_timeout_ms,
            self.session.poll_interval_ms
        );
        if let Some(max) = self.server.max_connections {
            ensure!(max > 0, "server.max_connections must be non-zero when set");
        }

        Ok(())
    }

    /// Address the listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.interface, self.server.port)
    }
}
