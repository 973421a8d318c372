use std::io::Write;
use std::time::Duration;

use json_log_sentry::env::{env_or, SENTRY_DSN_ENV};
use json_log_sentry::{SentryWriter, WriterConfig};

/// Sends a few JSON log lines to the Sentry project named by `SENTRY_DSN`.
/// With no DSN set the client is disabled and nothing leaves the process.
fn main() {
    let dsn = env_or(SENTRY_DSN_ENV, "");
    let config = WriterConfig::from_env()
        .expect("valid LOG_SENTRY_* variables")
        .with_release(env!("CARGO_PKG_VERSION"))
        .with_flush_timeout(Duration::from_secs(5));

    let mut writer = SentryWriter::new(&dsn, config).expect("valid DSN");

    let lines = [
        r#"{"level":"info","message":"service started"}"#,
        r#"{"level":"error","message":"payment declined","error":"card expired","user_id":"42","order":1017}"#,
        r#"{"level":"error","message":"cache miss storm","fingerprint":"cache-storm","keys":3120}"#,
    ];
    for line in lines {
        writer.write_all(line.as_bytes()).expect("write never fails");
    }

    if !writer.close() {
        eprintln!("flush timed out, some events may be lost");
    }
}
