use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::{error, warn};

use json_log_sentry::init::{init_tracing_with_config, InitConfig};
use json_log_sentry::noop_sink::NoopSink;
use json_log_sentry::{SentryWriter, Severity, WriterConfig};

/// Measures the writer from many Tokio tasks at once, with warnings
/// enabled and the stdout layer turned off.
#[tokio::main]
async fn main() {
    let config = WriterConfig::default()
        .with_levels([Severity::Warn, Severity::Error, Severity::Fatal])
        .with_ignore_errors(["^cancelled$"])
        .with_flush_timeout(Duration::from_millis(200));
    let writer = SentryWriter::with_sink(Arc::new(NoopSink), config).expect("valid config");

    let init_config = InitConfig {
        enable_stdout: false,
        include_target: false,
    };
    init_tracing_with_config(writer.clone(), init_config).expect("set global subscriber");

    let tasks: u64 = 8;
    let per_task: u64 = 12_500;
    let start = Instant::now();

    let handles: Vec<_> = (0..tasks)
        .map(|task| {
            tokio::spawn(async move {
                for i in 0..per_task {
                    if i % 2 == 0 {
                        warn!(task, iteration = i, "custom load test warning");
                    } else {
                        error!(task, iteration = i, error = "cancelled", "custom load test error");
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("load task panicked");
    }

    let n = tasks * per_task;
    let elapsed = start.elapsed();
    println!("custom config: translated {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    writer.close();
}
