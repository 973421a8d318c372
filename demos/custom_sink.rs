use std::sync::Arc;
use std::time::Duration;

use json_log_sentry::init::init_tracing;
use json_log_sentry::{EventSink, NormalizedEvent, SentryWriter, WriterConfig};
use tracing::{error, info};

/// Example of integrating a completely custom reporting backend by
/// implementing the `EventSink` trait directly. Imagine this talks to some
/// in-house incident tracker.
struct StdoutSink;

impl EventSink for StdoutSink {
    fn capture_event(&self, event: NormalizedEvent) {
        // Here you would call your own client library.
        // For the sake of example we just print the event as JSON.
        match serde_json::to_string_pretty(&event) {
            Ok(json) => println!("[incident-tracker] {}", json),
            Err(e) => eprintln!("[incident-tracker] cannot serialize event: {}", e),
        }
    }

    fn flush(&self, _timeout: Duration) -> bool {
        true
    }
}

fn main() {
    let writer = SentryWriter::with_sink(Arc::new(StdoutSink), WriterConfig::default())
        .expect("default config is valid");
    init_tracing(writer.clone()).expect("set global subscriber");

    info!("custom sink example started");
    error!(db = "orders", error = "connection refused", "simulated error sent via custom sink");

    writer.close();
}
