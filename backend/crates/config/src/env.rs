use std::env;
use std::str::FromStr;
use std::time::Duration;

use pulse_common::error::{PulseError, PulseResult};
use serde::Deserialize;

/// Run-level settings shared read-only by every adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Trailing window, in days, bounding every fetch.
    pub window_days: u32,
    /// Upper bound on in-flight per-record enrichment calls inside one adapter.
    pub max_concurrency: usize,
    /// Overall deadline for a collection run.
    pub run_timeout_secs: u64,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads the optional knobs.
    pub fn from_env() -> PulseResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        let cfg = Self {
            window_days: parse_var_or("DAYS_TO_ANALYZE", 30)?,
            max_concurrency: parse_var_or("MAX_CONCURRENCY", 4)?,
            run_timeout_secs: parse_var_or("RUN_TIMEOUT_SECS", 120)?,
            log_level: get_var_or("LOG_LEVEL", "info"),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> PulseResult<()> {
        if self.window_days == 0 {
            return Err(PulseError::Validation(
                "DAYS_TO_ANALYZE must be at least 1".to_owned(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(PulseError::Validation(
                "MAX_CONCURRENCY must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

/// Read a variable, treating an empty value as unset.
pub fn get_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read a required variable.
pub fn require_var(key: &str) -> PulseResult<String> {
    get_var(key).ok_or_else(|| PulseError::Config(format!("{key} is required but not set")))
}

pub fn get_var_or(key: &str, default: &str) -> String {
    get_var(key).unwrap_or_else(|| default.to_owned())
}

/// Parse a variable, falling back to `default` when unset.
/// A value that is set but unparsable is a configuration error.
pub fn parse_var_or<T>(key: &str, default: T) -> PulseResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| PulseError::Config(format!("invalid {key}: {e}"))),
        None => Ok(default),
    }
}

/// Parse a comma-separated list, trimming entries and dropping blanks.
pub fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}
