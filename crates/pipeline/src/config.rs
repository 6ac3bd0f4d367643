use std::str::FromStr;
use std::time::Duration;

use orgimport_core::batching::{compute_batch_size, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MIN_BATCH_SIZE};
use orgimport_core::error::CoreError;
use orgimport_core::workflow::ZeroAppliedPolicy;

/// Batch controller tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchImportConfig {
    /// Fixed batch size. When `None` the size is derived from the item
    /// count and clamped to `[min_batch_size, max_batch_size]`.
    pub batch_size: Option<usize>,
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    /// Pause between consecutive batches.
    pub delay_between_batches: Duration,
    /// Extra attempts for items that fail; `0` disables retries.
    pub retry_attempts: u32,
    /// Delay before the first retry.
    pub retry_delay: Duration,
    /// Growth factor for each further retry delay.
    pub backoff_multiplier: f64,
    /// Upper bound on any single retry delay.
    pub max_retry_delay: Duration,
}

impl Default for BatchImportConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            min_batch_size: DEFAULT_MIN_BATCH_SIZE,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            delay_between_batches: Duration::from_millis(100),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

impl BatchImportConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default   |
    /// |-----------------------------|-----------|
    /// | `IMPORT_BATCH_SIZE`         | (derived) |
    /// | `IMPORT_MIN_BATCH_SIZE`     | `5`       |
    /// | `IMPORT_MAX_BATCH_SIZE`     | `100`     |
    /// | `IMPORT_BATCH_DELAY_MS`     | `100`     |
    /// | `IMPORT_RETRY_ATTEMPTS`     | `3`       |
    /// | `IMPORT_RETRY_DELAY_MS`     | `1000`    |
    /// | `IMPORT_BACKOFF_MULTIPLIER` | `2.0`     |
    /// | `IMPORT_MAX_RETRY_DELAY_MS` | `30000`   |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let defaults = Self::default();

        let batch_size = match lookup("IMPORT_BATCH_SIZE") {
            Some(raw) => Some(parse_var("IMPORT_BATCH_SIZE", &raw)?),
            None => None,
        };

        let config = Self {
            batch_size,
            min_batch_size: var_or(&lookup, "IMPORT_MIN_BATCH_SIZE", defaults.min_batch_size)?,
            max_batch_size: var_or(&lookup, "IMPORT_MAX_BATCH_SIZE", defaults.max_batch_size)?,
            delay_between_batches: millis_or(
                &lookup,
                "IMPORT_BATCH_DELAY_MS",
                defaults.delay_between_batches,
            )?,
            retry_attempts: var_or(&lookup, "IMPORT_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_delay: millis_or(&lookup, "IMPORT_RETRY_DELAY_MS", defaults.retry_delay)?,
            backoff_multiplier: var_or(
                &lookup,
                "IMPORT_BACKOFF_MULTIPLIER",
                defaults.backoff_multiplier,
            )?,
            max_retry_delay: millis_or(
                &lookup,
                "IMPORT_MAX_RETRY_DELAY_MS",
                defaults.max_retry_delay,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.batch_size == Some(0) {
            return Err(CoreError::Config("batch_size must be at least 1".to_string()));
        }
        if self.min_batch_size == 0 {
            return Err(CoreError::Config(
                "min_batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_batch_size < self.min_batch_size {
            return Err(CoreError::Config(format!(
                "max_batch_size ({}) must not be below min_batch_size ({})",
                self.max_batch_size, self.min_batch_size
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(CoreError::Config(format!(
                "backoff_multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_retry_delay < self.retry_delay {
            return Err(CoreError::Config(
                "max_retry_delay must not be below retry_delay".to_string(),
            ));
        }
        Ok(())
    }

    /// Batch size to use for `total` items.
    pub fn batch_size_for(&self, total: usize) -> usize {
        match self.batch_size {
            Some(size) => size.max(1),
            None => compute_batch_size(total, self.min_batch_size, self.max_batch_size),
        }
    }
}

/// Everything an import session needs besides its store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfig {
    pub batch: BatchImportConfig,
    pub zero_applied: ZeroAppliedPolicy,
}

impl SessionConfig {
    /// Batch settings as in [`BatchImportConfig::from_env`], plus
    /// `IMPORT_ZERO_APPLIED` (`error` or `no_changes`, default `error`).
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let zero_applied = match lookup("IMPORT_ZERO_APPLIED").as_deref().map(str::trim) {
            None | Some("") | Some("error") => ZeroAppliedPolicy::Error,
            Some("no_changes") => ZeroAppliedPolicy::NoChanges,
            Some(other) => {
                return Err(CoreError::Config(format!(
                    "IMPORT_ZERO_APPLIED must be 'error' or 'no_changes', got '{other}'"
                )))
            }
        };
        Ok(Self {
            batch: BatchImportConfig::from_lookup(lookup)?,
            zero_applied,
        })
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| CoreError::Config(format!("{name} is invalid ('{raw}'): {e}")))
}

fn var_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => parse_var(name, &raw),
        None => Ok(default),
    }
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> Result<Duration, CoreError> {
    match lookup(name) {
        Some(raw) => parse_var::<u64>(name, &raw).map(Duration::from_millis),
        None => Ok(default),
    }
}
