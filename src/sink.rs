use crate::config::BeforeSend;
use crate::error::{BridgeError, Result};
use crate::event::NormalizedEvent;
use regex::RegexSet;
use std::sync::Arc;
use std::time::Duration;

/// Destination for [`NormalizedEvent`]s produced by the writer.
///
/// Implementations wrap an error-reporting client. Both methods are called
/// from the thread that performed the log `write`, so `capture_event` should
/// only enqueue and return.
pub trait EventSink: Send + Sync {
    /// Hand one event to the client. Fire and forget.
    fn capture_event(&self, event: NormalizedEvent);

    /// Block until queued events are delivered or `timeout` elapses.
    ///
    /// **Returns**
    /// - `true` if the queue drained in time.
    /// - `false` if the timeout elapsed first; pending events may be lost.
    fn flush(&self, timeout: Duration) -> bool;
}

/// Last stage of the bridge: filters, lets the callback rewrite or cancel,
/// then submits to the [`EventSink`].
pub struct SinkAdapter {
    sink: Arc<dyn EventSink>,
    flush_timeout: Duration,
    ignore: Option<RegexSet>,
    before_send: Option<BeforeSend>,
}

impl SinkAdapter {
    /// Build an adapter around `sink`.
    ///
    /// Fails with [`BridgeError::InvalidIgnorePattern`] naming the first
    /// pattern that does not compile.
    pub fn new(
        sink: Arc<dyn EventSink>,
        flush_timeout: Duration,
        ignore_errors: &[String],
        before_send: Option<BeforeSend>,
    ) -> Result<Self> {
        Ok(Self {
            sink,
            flush_timeout,
            ignore: compile_ignore(ignore_errors)?,
            before_send,
        })
    }

    pub fn flush_timeout(&self) -> Duration {
        self.flush_timeout
    }

    /// Submit an event, flushing synchronously when it is fatal.
    pub fn submit(&self, event: NormalizedEvent) {
        if self.is_ignored(&event) {
            tracing::debug!(event_message = ?event.message, "event matched an ignore pattern, dropping");
            return;
        }

        let event = match &self.before_send {
            Some(callback) => match callback(event) {
                Some(event) => event,
                None => {
                    tracing::debug!("event cancelled by before_send callback");
                    return;
                }
            },
            None => event,
        };

        let terminal = event.level.is_terminal();
        self.sink.capture_event(event);

        // Fatal records usually precede process exit.
        if terminal {
            self.flush();
        }
    }

    /// Blocking flush bounded by the configured timeout.
    pub fn flush(&self) -> bool {
        let drained = self.sink.flush(self.flush_timeout);
        if !drained {
            tracing::warn!(timeout = ?self.flush_timeout, "event sink flush timed out");
        }
        drained
    }

    fn is_ignored(&self, event: &NormalizedEvent) -> bool {
        match &self.ignore {
            Some(set) => event.match_candidates().any(|text| set.is_match(text)),
            None => false,
        }
    }
}

fn compile_ignore(patterns: &[String]) -> Result<Option<RegexSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    // RegexSet errors do not say which pattern failed, so check each first.
    for pattern in patterns {
        regex::Regex::new(pattern).map_err(|source| BridgeError::InvalidIgnorePattern {
            pattern: pattern.clone(),
            source,
        })?;
    }
    RegexSet::new(patterns)
        .map(Some)
        .map_err(|source| BridgeError::InvalidIgnorePattern {
            pattern: patterns.join(", "),
            source,
        })
}
