use crate::config::WriterConfig;
use crate::error::Result;
use crate::event::NormalizedEvent;
use crate::extract::FieldExtractor;
use crate::filter::LevelFilter;
use crate::severity::Severity;
use crate::sink::{EventSink, SinkAdapter};
use std::io;
use std::sync::Arc;
use tracing::Metadata;
use tracing_subscriber::fmt::MakeWriter;

/// `io::Write` sink for JSON log lines that reports qualifying records as
/// error events.
///
/// Every `write` call must carry exactly one JSON object. The writer always
/// reports the full buffer as written: filtered, malformed and ignored
/// records are dropped without an error. Cloning is cheap and clones share
/// the same sink.
#[derive(Clone)]
pub struct SentryWriter {
    inner: Arc<Inner>,
}

struct Inner {
    filter: LevelFilter,
    extractor: FieldExtractor,
    adapter: SinkAdapter,
}

impl SentryWriter {
    /// Create a writer backed by a Sentry client for `dsn`.
    ///
    /// An empty DSN yields a client that discards events.
    #[cfg(feature = "sentry")]
    pub fn new(dsn: &str, config: WriterConfig) -> Result<Self> {
        let sink = crate::sentry_sink::SentrySink::new(dsn, &config)?;
        Self::with_sink(Arc::new(sink), config)
    }

    /// Create a writer that submits to an arbitrary [`EventSink`].
    ///
    /// **Errors**
    /// - [`crate::BridgeError::InvalidConfiguration`] for out-of-range rates.
    /// - [`crate::BridgeError::InvalidIgnorePattern`] for a bad regex.
    pub fn with_sink(sink: Arc<dyn EventSink>, config: WriterConfig) -> Result<Self> {
        config.validate()?;

        let WriterConfig {
            levels,
            ignore_errors,
            flush_timeout,
            before_send,
            fields,
            stack,
            ..
        } = config;

        let filter = LevelFilter::new(levels, fields.level.clone());
        let extractor = FieldExtractor::new(fields, stack);
        let adapter = SinkAdapter::new(sink, flush_timeout, &ignore_errors, before_send)?;

        Ok(Self {
            inner: Arc::new(Inner {
                filter,
                extractor,
                adapter,
            }),
        })
    }

    /// Translate one record whose severity still has to be read from it.
    ///
    /// Always returns `data.len()`.
    pub fn write_record(&self, data: &[u8]) -> usize {
        match self.inner.filter.should_process(data) {
            (Some(severity), true) => self.translate(severity, data),
            (Some(severity), false) => {
                tracing::trace!(%severity, "record below enabled severities");
            }
            (None, _) => {
                tracing::trace!("record without a parseable severity");
            }
        }
        data.len()
    }

    /// Translate one record whose severity is already known, skipping the
    /// severity lookup.
    ///
    /// Always returns `data.len()`.
    pub fn write_level(&self, severity: Severity, data: &[u8]) -> usize {
        if self.inner.filter.is_enabled(severity) {
            self.translate(severity, data);
        }
        data.len()
    }

    /// Flush the sink, blocking for at most the configured timeout. Call
    /// once during orderly shutdown.
    pub fn close(&self) -> bool {
        self.inner.adapter.flush()
    }

    fn translate(&self, severity: Severity, data: &[u8]) {
        match self.inner.extractor.extract(data) {
            Some(extracted) => {
                let event = NormalizedEvent::assemble(severity, extracted);
                self.inner.adapter.submit(event);
            }
            None => tracing::debug!(%severity, "dropping malformed log record"),
        }
    }
}

impl io::Write for SentryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_record(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for &SentryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_record(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer handed out per event when the severity is known from metadata.
pub struct LevelWriter<'a> {
    writer: &'a SentryWriter,
    severity: Option<Severity>,
}

impl io::Write for LevelWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(match self.severity {
            Some(severity) => self.writer.write_level(severity, buf),
            None => self.writer.write_record(buf),
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SentryWriter {
    type Writer = LevelWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LevelWriter {
            writer: self,
            severity: None,
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        LevelWriter {
            writer: self,
            severity: Some(Severity::from(*meta.level())),
        }
    }
}
