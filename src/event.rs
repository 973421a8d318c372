use crate::extract::Extracted;
use crate::severity::{EventLevel, Severity};
use crate::stack::StackFrame;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Logger tag attached to every event produced by this crate.
pub const LOGGER_NAME: &str = "json-log-sentry";

/// One error reported for a record, built from an `error` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exception {
    /// Exception type; set to the record's final message.
    pub ty: String,
    pub value: String,
    /// Frames innermost first.
    pub stacktrace: Vec<StackFrame>,
}

/// Error event translated from one structured log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEvent {
    pub timestamp: DateTime<Utc>,
    pub level: EventLevel,
    pub message: Option<String>,
    pub fingerprint: Vec<String>,
    pub exceptions: Vec<Exception>,
    pub user_id: Option<String>,
    pub extra: BTreeMap<String, serde_json::Value>,
    pub logger: &'static str,
}

impl NormalizedEvent {
    /// Combine extracted fields with the mapped level and the capture time.
    pub fn assemble(severity: Severity, extracted: Extracted) -> Self {
        Self {
            timestamp: Utc::now(),
            level: severity.event_level(),
            message: extracted.message,
            fingerprint: extracted.fingerprint,
            exceptions: extracted.exceptions,
            user_id: extracted.user_id,
            extra: extracted.extra,
            logger: LOGGER_NAME,
        }
    }

    /// Texts matched against ignore patterns: the message, then each
    /// exception's type and value.
    pub fn match_candidates(&self) -> impl Iterator<Item = &str> {
        self.message
            .as_deref()
            .into_iter()
            .chain(self.exceptions.iter().flat_map(|e| [e.ty.as_str(), e.value.as_str()]))
    }
}
