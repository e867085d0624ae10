use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;
use crate::severity::Severity;

/// Unit used for `runtime.elapsed` in emitted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElapsedUnit {
    /// `"1ms"`
    #[default]
    Millisecond,
}

impl ElapsedUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElapsedUnit::Millisecond => "1ms",
        }
    }

    pub fn scale(&self, elapsed: Duration) -> i64 {
        match self {
            ElapsedUnit::Millisecond => elapsed.num_milliseconds(),
        }
    }
}

impl FromStr for ElapsedUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1ms" | "ms" => Ok(ElapsedUnit::Millisecond),
            other => Err(ConfigError::UnknownElapsedUnit(other.to_string())),
        }
    }
}

impl Serialize for ElapsedUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ElapsedUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?.parse().map_err(serde::de::Error::custom)
    }
}

/// One entry of `mask_keywords`.
///
/// `Exact` matches object keys by string equality. `Pattern` matches object
/// keys anywhere in the key, and additionally masks its first capture group
/// inside string values.
#[derive(Debug, Clone)]
pub enum MaskKeyword {
    Exact(String),
    Pattern(Regex),
}

impl MaskKeyword {
    pub fn exact(keyword: impl Into<String>) -> Self {
        MaskKeyword::Exact(keyword.into())
    }

    /// Compile `pattern` as a regex keyword.
    pub fn pattern(pattern: &str) -> Result<Self, ConfigError> {
        Regex::new(pattern).map(MaskKeyword::Pattern).map_err(|source| {
            ConfigError::InvalidPattern { pattern: pattern.to_string(), source }
        })
    }

    /// Compile `pattern` with case-insensitive matching.
    pub fn pattern_ignore_case(pattern: &str) -> Result<Self, ConfigError> {
        Self::pattern(&format!("(?i){pattern}"))
    }

    /// Parse the textual form used in config files and env vars.
    ///
    /// `/body/flags` is a pattern (flags from `imsx`, folded into the regex
    /// as inline flags); anything else is an exact key.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let Some((body, flags)) = split_pattern_literal(raw) else {
            return Ok(MaskKeyword::exact(raw));
        };

        let mut inline = String::new();
        for flag in flags.chars() {
            match flag {
                'i' | 'm' | 's' | 'x' => inline.push(flag),
                // `g`, `u`, `y` have no meaning for a single match
                'g' | 'u' | 'y' => {}
                _ => return Ok(MaskKeyword::exact(raw)),
            }
        }
        if inline.is_empty() {
            Self::pattern(body)
        } else {
            Self::pattern(&format!("(?{inline}){body}"))
        }
    }

    /// Does this keyword select the object key `key`?
    pub fn matches_key(&self, key: &str) -> bool {
        match self {
            MaskKeyword::Exact(keyword) => keyword == key,
            MaskKeyword::Pattern(regex) => regex.is_match(key),
        }
    }
}

fn split_pattern_literal(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix('/')?;
    let close = rest.rfind('/')?;
    let (body, flags) = (&rest[..close], &rest[close + 1..]);
    if body.is_empty() {
        return None;
    }
    Some((body, flags))
}

impl fmt::Display for MaskKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskKeyword::Exact(keyword) => f.write_str(keyword),
            MaskKeyword::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

impl From<&str> for MaskKeyword {
    fn from(value: &str) -> Self {
        MaskKeyword::exact(value)
    }
}

impl From<Regex> for MaskKeyword {
    fn from(value: Regex) -> Self {
        MaskKeyword::Pattern(value)
    }
}

impl Serialize for MaskKeyword {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MaskKeyword {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        MaskKeyword::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Effective configuration of a [`Logone`](crate::logone::Logone).
///
/// Fixed at construction time and copied into every emitted record.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub elapsed_unit: ElapsedUnit,
    /// Entries strictly below this severity are dropped at finish.
    pub log_level: Severity,
    pub mask_keywords: Vec<MaskKeyword>,
}

impl Config {
    pub fn merge(self, overrides: LogoneConfig) -> Self {
        Self {
            elapsed_unit: overrides.elapsed_unit.unwrap_or(self.elapsed_unit),
            log_level: overrides.log_level.unwrap_or(self.log_level),
            mask_keywords: overrides.mask_keywords.unwrap_or(self.mask_keywords),
        }
    }
}

impl From<LogoneConfig> for Config {
    fn from(overrides: LogoneConfig) -> Self {
        Config::default().merge(overrides)
    }
}

/// Partial configuration; unset fields keep the defaults.
///
/// ```
/// use logone::config::{Config, LogoneConfig};
/// use logone::severity::Severity;
///
/// let partial: LogoneConfig =
///     serde_json::from_str(r#"{"logLevel": "INFO", "maskKeywords": ["password", "/token/i"]}"#).unwrap();
/// let config = Config::from(partial);
/// assert_eq!(config.log_level, Severity::Info);
/// assert_eq!(config.mask_keywords.len(), 2);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogoneConfig {
    pub elapsed_unit: Option<ElapsedUnit>,
    pub log_level: Option<Severity>,
    pub mask_keywords: Option<Vec<MaskKeyword>>,
}

impl LogoneConfig {
    pub fn log_level(mut self, level: Severity) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn mask_keywords<I, K>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<MaskKeyword>,
    {
        self.mask_keywords = Some(keywords.into_iter().map(Into::into).collect());
        self
    }

    pub fn elapsed_unit(mut self, unit: ElapsedUnit) -> Self {
        self.elapsed_unit = Some(unit);
        self
    }
}
