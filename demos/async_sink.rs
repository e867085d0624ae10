use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use logone::{AdapterError, ChannelAdapter, ChannelConfig, LoggerRecord, Logone, Payload, RecordSink};

/// Stand-in for a remote collector: prints one line per record.
struct PrintSink;

#[async_trait]
impl RecordSink for PrintSink {
    async fn send(&self, record: &LoggerRecord) -> Result<(), AdapterError> {
        print!("{}", record.to_json_line()?);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let (adapter, handle) = ChannelAdapter::new(Arc::new(PrintSink), ChannelConfig::default());
    let dropped = Arc::clone(&adapter.dropped_records);
    let sent = Arc::clone(&adapter.sent_records);
    let logone = Logone::new(Arc::new(adapter));

    let n: u64 = 500;
    let start = Instant::now();
    for i in 0..n {
        let session = logone.start("job", serde_json::json!({"iteration": i}));
        session.logger().info_with("processing", Payload::object([("iteration", i)]));
        if i % 100 == 0 {
            session.logger().error("checkpoint failed");
        }
        if let Err(e) = session.finish() {
            tracing::error!(error = %e, "finish failed");
        }
    }
    let elapsed = start.elapsed();

    // Closing the last adapter handle lets the background task drain and exit.
    drop(logone);
    if let Err(e) = handle.await {
        tracing::error!(error = %e, "background task failed");
    }

    eprintln!(
        "finished {} sessions in {:?}: {} sent, {} dropped",
        n,
        elapsed,
        sent.load(Ordering::Relaxed),
        dropped.load(Ordering::Relaxed)
    );
}
