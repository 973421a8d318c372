use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::error;

use json_log_sentry::init::init_tracing;
use json_log_sentry::noop_sink::NoopSink;
use json_log_sentry::{SentryWriter, WriterConfig};

#[tokio::main]
async fn main() {
    let writer = SentryWriter::with_sink(Arc::new(NoopSink), WriterConfig::default())
        .expect("default config is valid");
    init_tracing(writer.clone()).expect("set global subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: translated {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    sleep(Duration::from_millis(100)).await;
    writer.close();
}
