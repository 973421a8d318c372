use crate::config::WriterConfig;
use crate::error::{BridgeError, Result};
use crate::event::{Exception, NormalizedEvent};
use crate::severity::EventLevel;
use crate::sink::EventSink;
use crate::stack::StackFrame;
use sentry::protocol::{Event, Frame, Stacktrace, User};
use sentry::transports::ReqwestHttpTransport;
use sentry::types::Dsn;
use sentry::{ClientOptions, Hub, Level, Scope, Transport, TransportFactory};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

/// [`EventSink`] backed by a Sentry client.
///
/// The sink owns a dedicated [`Hub`] instead of binding the process-wide
/// one, so several writers with different DSNs can coexist. Use
/// [`SentrySink::current`] to report through whatever client the
/// application already installed with `sentry::init`.
#[derive(Clone)]
pub struct SentrySink {
    hub: Arc<Hub>,
}

impl SentrySink {
    /// Build a Sentry client for `dsn` from the client-facing part of
    /// `config`.
    ///
    /// **Errors**
    /// - [`BridgeError::InvalidDsn`] if `dsn` is not a valid Sentry DSN.
    /// - [`BridgeError::InvalidCertificate`] / [`BridgeError::InvalidProxy`]
    ///   when a custom HTTP client is needed and cannot be built.
    pub fn new(dsn: &str, config: &WriterConfig) -> Result<Self> {
        let options = client_options(dsn, config)?;
        let client = Arc::new(sentry::Client::from(options));
        tracing::debug!(enabled = client.is_enabled(), "sentry client created");

        let hub = Arc::new(Hub::new(Some(client), Arc::new(Scope::default())));
        Ok(Self { hub })
    }

    pub fn from_hub(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    /// Sink reporting through the hub active on the current thread.
    pub fn current() -> Self {
        Self::from_hub(Hub::current())
    }
}

impl EventSink for SentrySink {
    fn capture_event(&self, event: NormalizedEvent) {
        let id = self.hub.capture_event(to_sentry_event(event));
        tracing::trace!(%id, "event captured");
    }

    fn flush(&self, timeout: Duration) -> bool {
        match self.hub.client() {
            Some(client) => client.flush(Some(timeout)),
            None => true,
        }
    }
}

fn client_options(dsn: &str, config: &WriterConfig) -> Result<ClientOptions> {
    let dsn = if dsn.is_empty() {
        None
    } else {
        Some(
            dsn.parse::<Dsn>()
                .map_err(|e| BridgeError::invalid_dsn(dsn, e.to_string()))?,
        )
    };

    let traces_sample_rate = if config.tracing {
        config.traces_sample_rate as f32
    } else {
        0.0
    };

    let mut options = ClientOptions {
        dsn,
        sample_rate: config.sample_rate as f32,
        traces_sample_rate,
        release: config.release.clone().map(Cow::Owned),
        environment: config.environment.clone().map(Cow::Owned),
        server_name: config.resolved_server_name().map(Cow::Owned),
        debug: config.debug,
        http_proxy: config.http_proxy.clone().map(Cow::Owned),
        https_proxy: config.https_proxy.clone().map(Cow::Owned),
        // Panic hooks and other integrations are process-wide; leave them
        // to the application.
        default_integrations: false,
        ..Default::default()
    };

    if !config.ca_certs.is_empty() {
        options.transport = Some(Arc::new(CustomClientTransport {
            client: http_client(config)?,
        }));
    }

    Ok(sentry::apply_defaults(options))
}

/// HTTP client trusting the configured root certificates and routed through
/// the configured proxies.
fn http_client(config: &WriterConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();

    for pem in &config.ca_certs {
        let cert = reqwest::Certificate::from_pem(pem)
            .map_err(|e| BridgeError::certificate(e.to_string()))?;
        builder = builder.add_root_certificate(cert);
    }
    if let Some(proxy) = &config.http_proxy {
        let p = reqwest::Proxy::http(proxy).map_err(|e| BridgeError::proxy(proxy, e.to_string()))?;
        builder = builder.proxy(p);
    }
    if let Some(proxy) = &config.https_proxy {
        let p = reqwest::Proxy::https(proxy).map_err(|e| BridgeError::proxy(proxy, e.to_string()))?;
        builder = builder.proxy(p);
    }

    builder.build().map_err(|e| BridgeError::HttpClient(e.to_string()))
}

struct CustomClientTransport {
    client: reqwest::Client,
}

impl TransportFactory for CustomClientTransport {
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        Arc::new(ReqwestHttpTransport::with_client(options, self.client.clone()))
    }
}

fn sentry_level(level: EventLevel) -> Level {
    match level {
        EventLevel::Debug => Level::Debug,
        EventLevel::Info => Level::Info,
        EventLevel::Warning => Level::Warning,
        EventLevel::Error => Level::Error,
        EventLevel::Fatal => Level::Fatal,
    }
}

fn to_sentry_event(event: NormalizedEvent) -> Event<'static> {
    let NormalizedEvent {
        timestamp,
        level,
        message,
        fingerprint,
        exceptions,
        user_id,
        extra,
        logger,
    } = event;

    let mut out = Event {
        timestamp: timestamp.into(),
        level: sentry_level(level),
        message,
        logger: Some(logger.to_string()),
        exception: exceptions
            .into_iter()
            .map(to_sentry_exception)
            .collect::<Vec<_>>()
            .into(),
        user: user_id.map(|id| User {
            id: Some(id),
            ..Default::default()
        }),
        extra,
        ..Default::default()
    };
    // An empty list would disable Sentry's default grouping.
    if !fingerprint.is_empty() {
        out.fingerprint = Cow::Owned(fingerprint.into_iter().map(Cow::Owned).collect());
    }
    out
}

fn to_sentry_exception(exception: Exception) -> sentry::protocol::Exception {
    // Sentry lists frames oldest first.
    let frames = exception.stacktrace.into_iter().rev().map(to_sentry_frame).collect();
    sentry::protocol::Exception {
        ty: exception.ty,
        value: Some(exception.value),
        stacktrace: Some(Stacktrace {
            frames,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn to_sentry_frame(frame: StackFrame) -> Frame {
    Frame {
        function: Some(frame.function),
        module: Some(frame.module).filter(|m| !m.is_empty()),
        filename: frame.file,
        lineno: frame.line.map(u64::from),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;
    use crate::extract::Extracted;
    use std::collections::BTreeMap;

    fn normalized() -> NormalizedEvent {
        NormalizedEvent::assemble(
            Severity::Error,
            Extracted {
                message: Some("query failed".to_string()),
                fingerprint: vec!["query failed".to_string(), "deadlock".to_string()],
                exceptions: vec![Exception {
                    ty: "query failed".to_string(),
                    value: "deadlock".to_string(),
                    stacktrace: vec![
                        StackFrame::new("app::db::query").with_location("src/db.rs", 42),
                        StackFrame::new("app::main"),
                    ],
                }],
                user_id: Some("u-7".to_string()),
                extra: BTreeMap::from([("table".to_string(), serde_json::json!("orders"))]),
            },
        )
    }

    #[test]
    fn converts_to_sentry_event() {
        let event = to_sentry_event(normalized());
        assert_eq!(event.level, Level::Error);
        assert_eq!(event.message.as_deref(), Some("query failed"));
        assert_eq!(event.logger.as_deref(), Some(crate::event::LOGGER_NAME));
        assert_eq!(event.fingerprint.len(), 2);
        assert_eq!(event.fingerprint[1], "deadlock");
        assert_eq!(event.user.as_ref().and_then(|u| u.id.as_deref()), Some("u-7"));
        assert_eq!(event.extra["table"], serde_json::json!("orders"));
    }

    #[test]
    fn frames_are_reversed_to_oldest_first() {
        let event = to_sentry_event(normalized());
        let exception = &event.exception.values[0];
        assert_eq!(exception.ty, "query failed");
        assert_eq!(exception.value.as_deref(), Some("deadlock"));

        let frames = &exception.stacktrace.as_ref().unwrap().frames;
        assert_eq!(frames[0].function.as_deref(), Some("app::main"));
        assert_eq!(frames[1].function.as_deref(), Some("app::db::query"));
        assert_eq!(frames[1].module.as_deref(), Some("app::db"));
        assert_eq!(frames[1].lineno, Some(42));
    }

    #[test]
    fn empty_fingerprint_keeps_sentry_default() {
        let mut normalized = normalized();
        normalized.fingerprint.clear();
        let event = to_sentry_event(normalized);
        assert_eq!(event.fingerprint, Event::default().fingerprint);
    }

    #[test]
    fn maps_every_level() {
        assert_eq!(sentry_level(EventLevel::Debug), Level::Debug);
        assert_eq!(sentry_level(EventLevel::Warning), Level::Warning);
        assert_eq!(sentry_level(EventLevel::Fatal), Level::Fatal);
    }

    #[test]
    fn invalid_dsn_fails_construction() {
        let err = SentrySink::new("not a dsn", &WriterConfig::default()).err().unwrap();
        assert!(matches!(err, BridgeError::InvalidDsn { .. }));
    }

    const ROOT_CA: &[u8] = include_bytes!("../tests/data/isrg_root_x1.pem");

    #[test]
    fn trusted_ca_certificate_installs_custom_transport() {
        let config = WriterConfig::default().with_ca_cert_pem(ROOT_CA);
        let options = client_options("https://public@sentry.example.com/1", &config).unwrap();
        assert!(options.transport.is_some());

        assert!(http_client(&config.with_https_proxy("http://proxy.internal:3128")).is_ok());
    }

    #[test]
    fn garbage_certificate_fails_construction() {
        let config = WriterConfig::default().with_ca_cert_pem(b"not a certificate".to_vec());
        let err = SentrySink::new("", &config).err().unwrap();
        assert!(matches!(err, BridgeError::InvalidCertificate { .. }), "{err}");
    }

    #[test]
    fn bad_proxy_fails_construction() {
        let config = WriterConfig::default()
            .with_ca_cert_pem(ROOT_CA)
            .with_http_proxy("http://exa mple.com:80");
        let err = SentrySink::new("", &config).err().unwrap();
        assert!(
            matches!(err, BridgeError::InvalidProxy { ref proxy, .. } if proxy == "http://exa mple.com:80"),
            "{err}"
        );
    }

    #[test]
    fn client_options_follow_config() {
        let config = WriterConfig::default()
            .with_release("2.0.0")
            .with_environment("prod")
            .with_server_name("worker-3")
            .with_sample_rate(0.25)
            .with_traces_sample_rate(0.5);
        let options = client_options("https://public@sentry.example.com/1", &config).unwrap();

        assert!(options.dsn.is_some());
        assert_eq!(options.release.as_deref(), Some("2.0.0"));
        assert_eq!(options.environment.as_deref(), Some("prod"));
        assert_eq!(options.server_name.as_deref(), Some("worker-3"));
        assert_eq!(options.sample_rate, 0.25);
        // Tracing is off, so its sample rate is not applied.
        assert_eq!(options.traces_sample_rate, 0.0);

        let options = client_options("", &config.with_tracing()).unwrap();
        assert_eq!(options.traces_sample_rate, 0.5);
    }
}
