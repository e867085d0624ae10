//! Environment variable names used by this crate for configuring a
//! [`Logone`](crate::logone::Logone) from a service's environment.
//!
//! These are purely helpers; the orchestrator itself never reads the
//! environment.

use crate::config::{LogoneConfig, MaskKeyword};
use crate::error::ConfigError;

/// Minimum severity kept in emitted records, e.g. `INFO`.
pub const LOGONE_LOG_LEVEL_ENV: &str = "LOGONE_LOG_LEVEL";

/// Comma-separated mask keywords, e.g. `password,/token/i`.
pub const LOGONE_MASK_KEYWORDS_ENV: &str = "LOGONE_MASK_KEYWORDS";

/// Elapsed-time unit, currently only `1ms`.
pub const LOGONE_ELAPSED_UNIT_ENV: &str = "LOGONE_ELAPSED_UNIT";

impl LogoneConfig {
    /// Partial configuration from the process environment. Unset or empty
    /// variables leave the corresponding default in place.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LogoneConfig::from_env`] with a custom lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut config = LogoneConfig::default();
        if let Some(level) = read(LOGONE_LOG_LEVEL_ENV) {
            config.log_level = Some(level.parse()?);
        }
        if let Some(unit) = read(LOGONE_ELAPSED_UNIT_ENV) {
            config.elapsed_unit = Some(unit.parse()?);
        }
        if let Some(keywords) = read(LOGONE_MASK_KEYWORDS_ENV) {
            config.mask_keywords = Some(
                keywords
                    .split(',')
                    .map(str::trim)
                    .filter(|keyword| !keyword.is_empty())
                    .map(MaskKeyword::parse)
                    .collect::<Result<_, _>>()?,
            );
        }
        Ok(config)
    }
}
