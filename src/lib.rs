//! Bridge from structured JSON log lines to Sentry error events.
//!
//! A [`SentryWriter`] is an `io::Write` (and a `tracing_subscriber`
//! `MakeWriter`) that receives one JSON object per write. Records whose
//! severity is enabled are translated into a [`NormalizedEvent`] with a
//! fingerprint and a call stack trimmed to the application's log call
//! site, then handed to an [`EventSink`].

pub mod config;
pub mod env;
pub mod error;
pub mod event;
pub mod extract;
pub mod filter;
pub mod init;
pub mod noop_sink;
pub mod severity;
pub mod sink;
pub mod stack;
pub mod writer;

#[cfg(feature = "sentry")]
pub mod sentry_sink;

pub use config::{BeforeSend, FieldNames, StackConfig, WriterConfig};
pub use error::{BridgeError, Result};
pub use event::{Exception, NormalizedEvent, LOGGER_NAME};
pub use severity::{EventLevel, Severity};
pub use sink::EventSink;
pub use stack::StackFrame;
pub use writer::SentryWriter;

#[cfg(feature = "sentry")]
pub use sentry_sink::SentrySink;
