use crate::error::{BridgeError, Result};
use crate::event::NormalizedEvent;
use crate::severity::Severity;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked right before an event is handed to the sink. Returning
/// `None` cancels the event.
pub type BeforeSend = Arc<dyn Fn(NormalizedEvent) -> Option<NormalizedEvent> + Send + Sync>;

/// Names of the reserved keys in a structured log record.
///
/// Defaults follow the common JSON logger layout (`level`, `message`,
/// `error`, `timestamp`), which is also what `tracing_subscriber`'s JSON
/// formatter emits with `flatten_event(true)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    pub level: String,
    pub message: String,
    pub error: String,
    pub timestamp: String,
    pub user_id: String,
    pub fingerprint: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            level: "level".to_string(),
            message: "message".to_string(),
            error: "error".to_string(),
            timestamp: "timestamp".to_string(),
            user_id: "user_id".to_string(),
            fingerprint: "fingerprint".to_string(),
        }
    }
}

/// Module sets used to trim captured stack traces.
///
/// **Fields**
/// - `internal_modules`: leading frames from these modules are dropped.
///   Always includes this crate and the stack capture library.
/// - `logger_modules`: the logging library's modules; the stack is cut right
///   after the first contiguous run of their frames.
/// - `passthrough_modules`: runtime modules (`std`, `core`, `alloc`) whose
///   frames do not interrupt a logger run, e.g. thread-local access inside
///   the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    pub internal_modules: Vec<String>,
    pub logger_modules: Vec<String>,
    pub passthrough_modules: Vec<String>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            internal_modules: vec![crate::stack::BRIDGE_MODULE.to_string(), "backtrace".to_string()],
            logger_modules: ["tracing", "tracing_core", "tracing_subscriber", "tracing_log", "log"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            passthrough_modules: ["std", "core", "alloc"].iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Configuration of a [`crate::writer::SentryWriter`] and, when the `sentry`
/// feature is enabled, of the underlying Sentry client.
///
/// Build it from [`WriterConfig::default`] and the chainable `with_*`
/// methods, or from the environment via [`WriterConfig::from_env`].
#[derive(Clone)]
pub struct WriterConfig {
    /// Severities that produce events. Default: error, fatal, panic.
    pub levels: Vec<Severity>,
    /// Share of events sent, in `[0, 1]`.
    pub sample_rate: f64,
    pub release: Option<String>,
    pub environment: Option<String>,
    /// Reported server name. Falls back to the host name.
    pub server_name: Option<String>,
    /// Regexes matched against the event message and each exception's type
    /// and value; any match drops the whole event.
    pub ignore_errors: Vec<String>,
    /// Enables the Sentry client's own debug output.
    pub debug: bool,
    pub tracing: bool,
    pub traces_sample_rate: f64,
    /// Upper bound for the blocking flush after fatal events and on close.
    pub flush_timeout: Duration,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    /// Extra trusted root certificates, PEM encoded.
    pub ca_certs: Vec<Vec<u8>>,
    pub before_send: Option<BeforeSend>,
    pub fields: FieldNames,
    pub stack: StackConfig,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            levels: vec![Severity::Error, Severity::Fatal, Severity::Panic],
            sample_rate: 1.0,
            release: None,
            environment: None,
            server_name: None,
            ignore_errors: Vec::new(),
            debug: false,
            tracing: false,
            traces_sample_rate: 0.0,
            flush_timeout: Duration::from_secs(3),
            http_proxy: None,
            https_proxy: None,
            ca_certs: Vec::new(),
            before_send: None,
            fields: FieldNames::default(),
            stack: StackConfig::default(),
        }
    }
}

impl fmt::Debug for WriterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterConfig")
            .field("levels", &self.levels)
            .field("sample_rate", &self.sample_rate)
            .field("release", &self.release)
            .field("environment", &self.environment)
            .field("server_name", &self.server_name)
            .field("ignore_errors", &self.ignore_errors)
            .field("debug", &self.debug)
            .field("tracing", &self.tracing)
            .field("traces_sample_rate", &self.traces_sample_rate)
            .field("flush_timeout", &self.flush_timeout)
            .field("http_proxy", &self.http_proxy)
            .field("https_proxy", &self.https_proxy)
            .field("ca_certs", &self.ca_certs.len())
            .field("before_send", &self.before_send.is_some())
            .field("fields", &self.fields)
            .field("stack", &self.stack)
            .finish()
    }
}

impl WriterConfig {
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = Severity>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    pub fn with_ignore_errors<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_errors = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    pub fn with_tracing(mut self) -> Self {
        self.tracing = true;
        self
    }

    pub fn with_traces_sample_rate(mut self, rate: f64) -> Self {
        self.traces_sample_rate = rate;
        self
    }

    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn with_http_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.http_proxy = Some(proxy.into());
        self
    }

    pub fn with_https_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.https_proxy = Some(proxy.into());
        self
    }

    pub fn with_ca_cert_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.ca_certs.push(pem.into());
        self
    }

    pub fn with_before_send<F>(mut self, callback: F) -> Self
    where
        F: Fn(NormalizedEvent) -> Option<NormalizedEvent> + Send + Sync + 'static,
    {
        self.before_send = Some(Arc::new(callback));
        self
    }

    pub fn with_field_names(mut self, fields: FieldNames) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_stack_config(mut self, stack: StackConfig) -> Self {
        self.stack = stack;
        self
    }

    /// Check value ranges that the client would otherwise reject or clamp.
    pub fn validate(&self) -> Result<()> {
        check_rate("sample_rate", self.sample_rate)?;
        check_rate("traces_sample_rate", self.traces_sample_rate)?;
        Ok(())
    }

    /// Server name to report: the configured one, else the host name.
    pub fn resolved_server_name(&self) -> Option<String> {
        self.server_name.clone().or_else(|| {
            hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok())
                .filter(|name| !name.is_empty())
        })
    }
}

fn check_rate(field: &str, rate: f64) -> Result<()> {
    if (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(BridgeError::config(
            field,
            format!("must be within [0, 1], got {}", rate),
        ))
    }
}
