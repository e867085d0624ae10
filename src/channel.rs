//! Asynchronous delivery: records are queued on a bounded channel and
//! handed to a [`RecordSink`] by a background Tokio task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};

use crate::adapter::Adapter;
use crate::error::AdapterError;
use crate::record::LoggerRecord;

/// Asynchronous destination for [`LoggerRecord`]s.
///
/// Called from the background task owned by [`ChannelAdapter`], never from
/// the thread that finished the session.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Send a single record to the backend.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the record.
    /// - `Err(..)` otherwise. The failure is logged and the record is not
    ///   retried.
    async fn send(&self, record: &LoggerRecord) -> Result<(), AdapterError>;

    /// Flush backend-side buffers. Called after every batch.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// Buffering and batching of a [`ChannelAdapter`].
///
/// **Fields**
/// - `channel_buffer`: records queued before new ones are dropped.
/// - `batch_size`: records handed to the sink per batch.
/// - `flush_interval`: longest time a partial batch waits.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
        }
    }
}

impl ChannelConfig {
    /// Same config with the minimum thresholds applied.
    fn clamped(self) -> Self {
        Self {
            channel_buffer: self.channel_buffer.max(16),
            batch_size: self.batch_size.max(1),
            flush_interval: self.flush_interval.max(Duration::from_millis(10)),
        }
    }
}

/// [`Adapter`] that decouples sink I/O from `finish`.
///
/// `output` only enqueues; a full or closed channel drops the record and
/// reports it as a failed delivery.
pub struct ChannelAdapter {
    sender: mpsc::Sender<LoggerRecord>,
    /// Records offered by `output`.
    pub total_records: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_records: Arc<AtomicU64>,
    /// Dropped because the channel was full or closed.
    pub dropped_records: Arc<AtomicU64>,
    /// Records the sink accepted.
    pub sent_records: Arc<AtomicU64>,
    /// Records the sink rejected.
    pub failed_records: Arc<AtomicU64>,
}

impl ChannelAdapter {
    /// Create the adapter and spawn its background task.
    ///
    /// Must be called inside a Tokio runtime. The task ends once every
    /// clone of the adapter is dropped, after delivering what is queued.
    pub fn new(sink: Arc<dyn RecordSink>, config: ChannelConfig) -> (Self, JoinHandle<()>) {
        let config = config.clamped();
        let (tx, mut rx) = mpsc::channel::<LoggerRecord>(config.channel_buffer);

        let sent_records = Arc::new(AtomicU64::new(0));
        let failed_records = Arc::new(AtomicU64::new(0));
        let counters = Counters {
            sent: Arc::clone(&sent_records),
            failed: Arc::clone(&failed_records),
        };

        let handle = tokio::spawn(async move {
            let batch_size = config.batch_size;
            let mut batch = Vec::with_capacity(batch_size);
            let mut ticker = time::interval(config.flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(record) => {
                            batch.push(record);
                            if batch.len() >= batch_size {
                                send_batch(&*sink, &mut batch, &counters).await;
                            }
                        }
                        None => {
                            if !batch.is_empty() {
                                send_batch(&*sink, &mut batch, &counters).await;
                            }
                            tracing::debug!("record channel closed; background task exiting");
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        if !batch.is_empty() {
                            send_batch(&*sink, &mut batch, &counters).await;
                        }
                    }
                }
            }
        });

        (
            Self {
                sender: tx,
                total_records: Arc::new(AtomicU64::new(0)),
                enqueued_records: Arc::new(AtomicU64::new(0)),
                dropped_records: Arc::new(AtomicU64::new(0)),
                sent_records,
                failed_records,
            },
            handle,
        )
    }
}

struct Counters {
    sent: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

async fn send_batch(sink: &dyn RecordSink, batch: &mut Vec<LoggerRecord>, counters: &Counters) {
    for record in batch.drain(..) {
        match sink.send(&record).await {
            Ok(()) => {
                counters.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(kind = %record.kind, error = %e, "record sink send failed; record discarded");
            }
        }
    }

    if let Err(e) = sink.flush().await {
        tracing::warn!(error = %e, "record sink flush failed");
    }
}

impl Adapter for ChannelAdapter {
    fn output(&self, record: &LoggerRecord) -> Result<(), AdapterError> {
        self.total_records.fetch_add(1, Ordering::Relaxed);
        match self.sender.try_send(record.clone()) {
            Ok(()) => {
                self.enqueued_records.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped_records.fetch_add(1, Ordering::Relaxed);
                Err("record channel full, dropping record".into())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped_records.fetch_add(1, Ordering::Relaxed);
                Err("record channel closed, dropping record".into())
            }
        }
    }

    fn name(&self) -> &str {
        "channel"
    }
}
