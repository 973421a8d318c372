//! Log severities and their mapping onto reported event levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a structured log record.
///
/// Ordered from least to most important. `Trace` exists so that records
/// produced by `tracing` can be classified; it is never enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Severity {
    pub const ALL: [Severity; 7] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
        Severity::Panic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Panic => "panic",
        }
    }

    /// Level of the event reported for a record of this severity.
    pub fn event_level(&self) -> EventLevel {
        match self {
            Severity::Trace | Severity::Debug => EventLevel::Debug,
            Severity::Info => EventLevel::Info,
            Severity::Warn => EventLevel::Warning,
            Severity::Error => EventLevel::Error,
            Severity::Fatal | Severity::Panic => EventLevel::Fatal,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            "panic" => Ok(Severity::Panic),
            _ => Err(format!("invalid severity: '{}'", s)),
        }
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Severity::Trace,
            tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warn,
            _ => Severity::Error,
        }
    }
}

/// Level attached to a reported event. `Fatal` is the terminal level and
/// forces a synchronous flush after submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl EventLevel {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventLevel::Fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("ERROR".parse::<Severity>(), Ok(Severity::Error));
        assert_eq!("Warning".parse::<Severity>(), Ok(Severity::Warn));
        assert_eq!("panic".parse::<Severity>(), Ok(Severity::Panic));
        assert!("verbose".parse::<Severity>().is_err());
        assert!("".parse::<Severity>().is_err());
    }

    #[test]
    fn every_severity_maps_to_one_level() {
        let levels: Vec<EventLevel> = Severity::ALL.iter().map(Severity::event_level).collect();
        assert_eq!(
            levels,
            vec![
                EventLevel::Debug,
                EventLevel::Debug,
                EventLevel::Info,
                EventLevel::Warning,
                EventLevel::Error,
                EventLevel::Fatal,
                EventLevel::Fatal,
            ]
        );
    }

    #[test]
    fn only_fatal_is_terminal() {
        assert!(Severity::Panic.event_level().is_terminal());
        assert!(Severity::Fatal.event_level().is_terminal());
        assert!(!Severity::Error.event_level().is_terminal());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for severity in Severity::ALL {
            assert_eq!(severity.to_string().parse::<Severity>(), Ok(severity));
        }
    }

    #[test]
    fn converts_tracing_levels() {
        assert_eq!(Severity::from(tracing::Level::ERROR), Severity::Error);
        assert_eq!(Severity::from(tracing::Level::TRACE), Severity::Trace);
    }
}
