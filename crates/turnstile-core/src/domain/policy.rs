//! Process-wide admission and authentication policy.
//!
//! Loaded once at startup and read-only afterwards.

use std::str::FromStr;
use std::time::Duration;

use crate::error::PolicyError;

/// What the sweeper does with a bucket that has been idle for a full
/// cleanup interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionMode {
    /// Drop it. The caller comes back with a full burst.
    #[default]
    Idle,
    /// Drop it only once its refill would have reached capacity, so idle
    /// callers keep any partial standing they still owe.
    Replenished,
}

impl FromStr for EvictionMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(EvictionMode::Idle),
            "replenished" => Ok(EvictionMode::Replenished),
            other => Err(PolicyError::UnknownEvictionMode(other.to_string())),
        }
    }
}

/// Token bucket parameters shared by every caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionPolicy {
    /// Tokens restored per second.
    pub requests_per_second: u32,
    /// Bucket capacity; the largest instantaneous burst.
    pub burst_size: u32,
    /// Sweep period, also the idle threshold for eviction.
    pub cleanup_interval: Duration,
    pub eviction: EvictionMode,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 20,
            cleanup_interval: Duration::from_secs(5 * 60),
            eviction: EvictionMode::Idle,
        }
    }
}

impl AdmissionPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.requests_per_second == 0 {
            return Err(PolicyError::ZeroRate);
        }
        if self.burst_size == 0 {
            return Err(PolicyError::ZeroBurst);
        }
        if self.cleanup_interval.is_zero() {
            return Err(PolicyError::ZeroCleanupInterval);
        }
        Ok(())
    }

    pub fn refill_rate(&self) -> f64 {
        f64::from(self.requests_per_second)
    }

    pub fn max_tokens(&self) -> f64 {
        f64::from(self.burst_size)
    }
}

/// Path prefixes that skip authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BypassPaths(Vec<String>);

impl BypassPaths {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        )
    }

    /// Parse a comma-separated list, ignoring blanks.
    pub fn parse_list(raw: &str) -> Self {
        Self::new(raw.split(',').map(str::trim))
    }

    pub fn matches(&self, path: &str) -> bool {
        self.0.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Default bypass list: health checks and the login/registration flow.
pub const DEFAULT_BYPASS_PATHS: &[&str] = &[
    "/api/health",
    "/api/ready",
    "/api/auth/login",
    "/api/auth/register",
];

/// Bearer credential parameters.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub signing_secret: String,
    pub token_lifetime: Duration,
    pub issuer: String,
    pub bypass_paths: BypassPaths,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            signing_secret: "change-me-in-production".to_string(),
            token_lifetime: Duration::from_secs(72 * 3600),
            issuer: "turnstile".to_string(),
            bypass_paths: BypassPaths::new(DEFAULT_BYPASS_PATHS.iter().copied()),
        }
    }
}

impl AuthPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.signing_secret.is_empty() {
            return Err(PolicyError::EmptySecret);
        }
        if self.token_lifetime.is_zero() {
            return Err(PolicyError::NonPositiveLifetime);
        }
        Ok(())
    }

    pub fn uses_default_secret(&self) -> bool {
        self.signing_secret == AuthPolicy::default().signing_secret
    }
}
