use crate::writer::SentryWriter;
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, Registry};

/// Configuration of the subscriber installed by [`init_tracing_with_config`].
///
/// **Fields**
/// - `enable_stdout`: if `true`, a human-readable `fmt` layer printing to
///   stdout is installed next to the reporting layer.
/// - `include_target`: whether the JSON lines handed to the writer carry
///   the event target (it lands in the event's `extra`).
#[derive(Clone, Debug)]
pub struct InitConfig {
    pub enable_stdout: bool,
    pub include_target: bool,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            enable_stdout: true,
            include_target: true,
        }
    }
}

/// `fmt` layer rendering each event as one flat JSON object and writing it
/// to `writer`. The severity is taken from the event metadata, so disabled
/// levels are dropped before any parsing.
pub fn sentry_layer<S>(writer: SentryWriter, include_target: bool) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_target(include_target)
        .with_writer(writer)
}

/// Install a global `tracing` subscriber that reports events through
/// `writer`.
///
/// **Returns**
/// - `Err(..)` if a global default subscriber was already set.
pub fn init_tracing_with_config(
    writer: SentryWriter,
    config: InitConfig,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let layer = sentry_layer(writer, config.include_target);

    // The stdout layer is optional; `Option<Layer>` keeps one subscriber type.
    let stdout = config.enable_stdout.then(tracing_subscriber::fmt::layer);
    let subscriber = Registry::default().with(layer).with(stdout);
    tracing::subscriber::set_global_default(subscriber)
}

/// Initialize tracing with [`InitConfig::default`].
pub fn init_tracing(writer: SentryWriter) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    init_tracing_with_config(writer, InitConfig::default())
}
