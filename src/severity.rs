use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ConfigError, SessionError};

/// Severity of a single entry and of a whole record.
///
/// Variants are declared in ascending order, so the derived `Ord` gives
/// `Debug < Info < Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    #[default]
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// All severities, lowest first.
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Highest severity among `severities`.
    ///
    /// **Returns**
    /// - `Ok(max)` by the total order above.
    /// - `Err(SessionError::NoEntries)` if the iterator is empty; the
    ///   orchestrator never aggregates an empty session, so this means a bug
    ///   on the caller's side.
    pub fn highest<I>(severities: I) -> Result<Severity, SessionError>
    where
        I: IntoIterator<Item = Severity>,
    {
        severities.into_iter().max().ok_or(SessionError::NoEntries)
    }

    /// `true` when an entry of this severity survives a `threshold` filter.
    pub fn passes(&self, threshold: Severity) -> bool {
        *self >= threshold
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Severity::ALL
            .into_iter()
            .find(|severity| severity.as_str() == upper)
            .ok_or_else(|| ConfigError::UnknownSeverity(s.to_string()))
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_order() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn highest_picks_maximum() {
        let got = Severity::highest([Severity::Info, Severity::Debug, Severity::Error]);
        assert_eq!(got, Ok(Severity::Error));
    }

    #[test]
    fn highest_of_nothing_is_an_error() {
        assert_eq!(Severity::highest(Vec::<Severity>::new()), Err(SessionError::NoEntries));
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!(" CRITICAL ".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("verbose".parse::<Severity>().is_err());
    }

    #[test]
    fn serializes_as_uppercase_name() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
        let back: Severity = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(back, Severity::Error);
    }
}
