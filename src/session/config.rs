use crate::config::Config;
use crate::recognition::RecognizerOptions;
use std::time::Duration;

/// Per-session settings, fixed at startup and shared by every connection
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Recognizer options used until a client config message changes the sample rate
    pub recognizer: RecognizerOptions,

    /// How often the idle watchdog checks the activity clock
    /// Default: 5 seconds
    pub poll_interval: Duration,

    /// Inactivity after which the server closes the connection
    /// Default: 15 seconds (three poll cycles)
    pub idle_timeout: Duration,

    /// Upper bound on the final-result call made during teardown
    pub finalize_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recognizer: RecognizerOptions::default(),
            poll_interval: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(15),
            finalize_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            recognizer: RecognizerOptions {
                sample_rate: cfg.recognizer.sample_rate,
                words: cfg.recognizer.words,
            },
            poll_interval: cfg.session.poll_interval(),
            idle_timeout: cfg.session.idle_timeout(),
            finalize_timeout: cfg.session.finalize_timeout(),
        }
    }
}
