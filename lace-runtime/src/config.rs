//! Cache policy selection.
//!
//! The result cache has three settings. The active one comes from the
//! `LACE_CACHE_MODE` environment variable and is sampled once at the start of
//! each [`Engine::execute`](crate::Engine::execute) call, so a long-lived
//! process picks up changes between executions but never mid-graph.

use std::fmt;
use std::str::FromStr;

use lace_result::Error;

/// Environment variable that selects the [`CacheMode`].
pub const CACHE_MODE_ENV_VAR: &str = "LACE_CACHE_MODE";

/// Which computed node results are kept across executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Cache every operation result by fingerprint.
    #[default]
    Full,
    /// Cache only operations the catalog marks cacheable (expensive work
    /// such as artifact hashing).
    Minimal,
    /// Cache nothing; every execution recomputes from scratch.
    Disabled,
}

impl CacheMode {
    /// Read the mode from [`CACHE_MODE_ENV_VAR`].
    ///
    /// An unset variable yields [`CacheMode::Full`]. An unrecognized value is
    /// logged and also falls back to `Full` rather than failing the
    /// execution.
    pub fn from_env() -> Self {
        match std::env::var(CACHE_MODE_ENV_VAR) {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    value = %raw,
                    "unrecognized {CACHE_MODE_ENV_VAR}; defaulting to full caching"
                );
                CacheMode::Full
            }),
            Err(_) => CacheMode::Full,
        }
    }

    /// Whether a result should be retained under this mode.
    pub fn retains(self, op_is_cacheable: bool) -> bool {
        match self {
            CacheMode::Full => true,
            CacheMode::Minimal => op_is_cacheable,
            CacheMode::Disabled => false,
        }
    }
}

impl FromStr for CacheMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(CacheMode::Full),
            "minimal" => Ok(CacheMode::Minimal),
            "disabled" => Ok(CacheMode::Disabled),
            other => Err(Error::InvalidArgument(format!(
                "unknown cache mode '{other}'; expected full, minimal, or disabled"
            ))),
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::Full => write!(f, "full"),
            CacheMode::Minimal => write!(f, "minimal"),
            CacheMode::Disabled => write!(f, "disabled"),
        }
    }
}
