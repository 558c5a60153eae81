//! Log filter selection
//!
//! `RUST_LOG` wins when set. Otherwise an explicit `log.level` is used, and
//! failing that the `LOGGER` environment variable picks one of three tiers:
//! - `llBaselogic` - connection lifecycle (info)
//! - `llExtLogic` - adds config handling (debug)
//! - `llFull` - adds every result payload (trace)

use tracing_subscriber::EnvFilter;

/// Environment variable holding the verbosity tier
pub const TIER_ENV: &str = "LOGGER";

/// Verbosity tiers understood in `LOGGER`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTier {
    Base,
    ExtLogic,
    Full,
}

impl LogTier {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "llBaselogic" => Some(Self::Base),
            "llExtLogic" => Some(Self::ExtLogic),
            "llFull" => Some(Self::Full),
            _ => None,
        }
    }

    /// Filter directive for this tier; other crates stay at `warn`
    pub fn directive(self) -> &'static str {
        match self {
            Self::Base => "warn,asr_gateway=info",
            Self::ExtLogic => "warn,asr_gateway=debug",
            Self::Full => "warn,asr_gateway=trace",
        }
    }
}

/// Pick the filter directive from the configured level and `LOGGER` value
pub fn filter_directive(level: Option<&str>, tier: Option<&str>) -> String {
    if let Some(level) = level {
        return level.to_string();
    }

    tier.and_then(LogTier::parse)
        .unwrap_or(LogTier::Base)
        .directive()
        .to_string()
}

/// Install the global `fmt` subscriber
pub fn init(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let tier = std::env::var(TIER_ENV).ok();
        EnvFilter::new(filter_directive(level, tier.as_deref()))
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
