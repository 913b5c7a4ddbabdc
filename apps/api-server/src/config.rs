//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use turnstile_core::PolicyError;
use turnstile_core::domain::{AdmissionPolicy, AuthPolicy, BypassPaths, EvictionMode};

/// Startup configuration failures. The process refuses to start on any of these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid admission policy: {0}")]
    Admission(#[source] PolicyError),

    #[error("invalid auth policy: {0}")]
    Auth(#[source] PolicyError),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    /// Key callers by `Forwarded`/`X-Forwarded-For` instead of the peer address.
    pub trust_proxy: bool,
    pub admission: AdmissionPolicy,
    pub auth: AuthPolicy,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`. Malformed numbers fall back to
    /// their defaults; out-of-range policy values are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AdmissionPolicy::default();
        let eviction = match lookup("RATE_LIMIT_EVICTION") {
            Some(raw) => EvictionMode::from_str(&raw).map_err(ConfigError::Admission)?,
            None => defaults.eviction,
        };

        let admission = AdmissionPolicy {
            requests_per_second: parse_or(&lookup, "RATE_LIMIT_RPS", defaults.requests_per_second),
            burst_size: parse_or(&lookup, "RATE_LIMIT_BURST", defaults.burst_size),
            cleanup_interval: Duration::from_secs(parse_or(
                &lookup,
                "RATE_LIMIT_CLEANUP_SECS",
                defaults.cleanup_interval.as_secs(),
            )),
            eviction,
        };
        admission.validate().map_err(ConfigError::Admission)?;

        let auth_defaults = AuthPolicy::default();
        let expiry_hours: u64 = parse_or(
            &lookup,
            "JWT_EXPIRY_HOURS",
            auth_defaults.token_lifetime.as_secs() / 3600,
        );

        let auth = AuthPolicy {
            signing_secret: lookup("JWT_SECRET").unwrap_or(auth_defaults.signing_secret),
            token_lifetime: Duration::from_secs(expiry_hours.saturating_mul(3600)),
            issuer: lookup("JWT_ISSUER").unwrap_or(auth_defaults.issuer),
            bypass_paths: lookup("AUTH_BYPASS_PATHS")
                .map(|raw| BypassPaths::parse_list(&raw))
                .unwrap_or(auth_defaults.bypass_paths),
        };
        auth.validate().map_err(ConfigError::Auth)?;

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8080),
            environment: lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
            trust_proxy: lookup("TRUST_PROXY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            admission,
            auth,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Complain about settings that are only acceptable in development.
    pub fn warn_insecure_defaults(&self) {
        if !self.auth.uses_default_secret() {
            return;
        }
        if self.is_production() {
            tracing::error!("JWT_SECRET is the built-in default in production; set a real secret");
        } else {
            tracing::warn!("JWT_SECRET not set, using the built-in development secret");
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}
