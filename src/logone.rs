//! Session orchestrator.
//!
//! A [`Logone`] owns the configuration, the adapters and the live
//! listeners. Each [`Logone::start`] opens an independent [`Session`]; the
//! first `finish` of a session turns its entries into at most one
//! [`LoggerRecord`] and fans it out to every adapter.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::adapter::{AdapterHandle, AdapterSet};
use crate::config::Config;
use crate::error::LogoneError;
use crate::logger::{EntryCallback, Logger, SessionState};
use crate::record::{Context, LogEntry, LoggerRecord, Runtime};
use crate::sanitize;
use crate::severity::Severity;
use crate::stacker::Stacker;
use crate::timer::{Clock, SystemClock, Timer};

type Listener = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// State shared by a [`Logone`], its sessions and its subscriptions.
struct Registry {
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    adapters: RwLock<Vec<AdapterHandle>>,
    listeners: RwLock<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
}

impl Registry {
    /// Live fan-out of one raw entry to listeners and streaming adapters.
    fn notify(&self, entry: &LogEntry) {
        let listeners = self.listeners.read().clone();
        for (id, listener) in &listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(entry))) {
                tracing::error!(
                    listener = id,
                    panic = %crate::panic_message(panic.as_ref()),
                    "log listener panicked"
                );
            }
        }

        let adapters = self.adapters.read().clone();
        for handle in adapters.iter() {
            let Some(streaming) = handle.as_streaming() else {
                continue;
            };
            match catch_unwind(AssertUnwindSafe(|| streaming.on_entry(entry, &self.config))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(adapter = handle.name(), error = %err, "adapter failed to receive entry");
                }
                Err(panic) => {
                    tracing::error!(
                        adapter = handle.name(),
                        panic = %crate::panic_message(panic.as_ref()),
                        "adapter panicked while receiving entry"
                    );
                }
            }
        }
    }

    /// Hand `record` to every adapter. Returns `(delivered, failed)`.
    fn deliver(&self, record: &LoggerRecord) -> (usize, usize) {
        let adapters = self.adapters.read().clone();
        let mut delivered = 0;
        let mut failed = 0;

        for handle in adapters.iter() {
            match catch_unwind(AssertUnwindSafe(|| handle.output_record(record))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    failed += 1;
                    tracing::error!(adapter = handle.name(), kind = %record.kind, error = %err, "adapter failed to output record");
                }
                Err(panic) => {
                    failed += 1;
                    tracing::error!(
                        adapter = handle.name(),
                        kind = %record.kind,
                        panic = %crate::panic_message(panic.as_ref()),
                        "adapter panicked while outputting record"
                    );
                }
            }
        }

        (delivered, failed)
    }
}

/// Entry point: configuration plus the adapters records are delivered to.
///
/// ```
/// use std::sync::Arc;
/// use logone::config::LogoneConfig;
/// use logone::logone::{FinishOutcome, Logone};
/// use logone::memory::MemoryAdapter;
/// use logone::record::Context;
/// use logone::severity::Severity;
///
/// let memory = Arc::new(MemoryAdapter::new());
/// let logone = Logone::with_config(
///     memory.clone(),
///     LogoneConfig::default().log_level(Severity::Info),
/// );
///
/// let session = logone.start("request", Context::new().with("path", "/users"));
/// session.logger().debug("dropped by the level filter");
/// session.logger().info("kept");
///
/// let outcome = session.finish().unwrap();
/// assert_eq!(outcome, FinishOutcome::Emitted { delivered: 1, failed: 0 });
/// assert_eq!(memory.records()[0].runtime.lines.len(), 1);
/// ```
#[derive(Clone)]
pub struct Logone {
    shared: Arc<Registry>,
}

impl Logone {
    /// Default configuration.
    pub fn new(adapters: impl Into<AdapterSet>) -> Self {
        Self::with_config(adapters, Config::default())
    }

    pub fn with_config(adapters: impl Into<AdapterSet>, config: impl Into<Config>) -> Self {
        Self::with_clock(adapters, config, Arc::new(SystemClock))
    }

    /// Like [`Logone::with_config`], reading time from `clock`.
    pub fn with_clock(
        adapters: impl Into<AdapterSet>,
        config: impl Into<Config>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared: Arc::new(Registry {
                config: Arc::new(config.into()),
                clock,
                adapters: RwLock::new(adapters.into().into_vec()),
                listeners: RwLock::new(Vec::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Register another adapter. Sessions already running deliver to it too.
    pub fn add_adapter(&self, adapter: impl Into<AdapterHandle>) {
        let handle = adapter.into();
        tracing::debug!(adapter = handle.name(), streaming = handle.is_streaming(), "adapter registered");
        self.shared.adapters.write().push(handle);
    }

    pub fn adapter_count(&self) -> usize {
        self.shared.adapters.read().len()
    }

    /// Call `listener` for every raw entry of every session, as it is logged.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        let id = self.shared.next_listener.fetch_add(1, Ordering::Relaxed);
        self.shared.listeners.write().push((id, Arc::new(listener)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.shared),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.read().len()
    }

    /// Open a session with a started timer.
    pub fn start(&self, kind: impl Into<String>, context: impl Into<Context>) -> Session {
        let mut timer = Timer::with_clock(self.shared.config.elapsed_unit, self.shared.clock.clone());
        timer.start();

        let registry = self.shared.clone();
        let on_entry: EntryCallback = Arc::new(move |entry: &LogEntry| registry.notify(entry));
        let logger = Logger::with_callback(timer, Stacker::new(), Some(on_entry));

        let finish = FinishHandle {
            state: logger.state().clone(),
            registry: self.shared.clone(),
            kind: kind.into(),
            context: context.into(),
        };
        Session { logger, finish }
    }
}

impl std::fmt::Debug for Logone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logone")
            .field("config", &self.shared.config)
            .field("adapters", &*self.shared.adapters.read())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// What the first `finish` of a session did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    /// A record was built and handed to the adapters.
    Emitted { delivered: usize, failed: usize },
    /// Nothing was logged.
    Empty,
    /// Every entry was below the configured level.
    Filtered,
    /// The session had already been finished.
    AlreadyFinished,
}

impl FinishOutcome {
    pub fn is_emitted(&self) -> bool {
        matches!(self, FinishOutcome::Emitted { .. })
    }
}

/// One unit of work being logged: a [`Logger`] and the handle that ends it.
#[derive(Debug)]
pub struct Session {
    logger: Logger,
    finish: FinishHandle,
}

impl Session {
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn finish(&self) -> Result<FinishOutcome, LogoneError> {
        self.finish.finish()
    }

    pub fn into_parts(self) -> (Logger, FinishHandle) {
        (self.logger, self.finish)
    }
}

/// Ends a session. Only the first call has an effect.
#[derive(Clone)]
pub struct FinishHandle {
    state: Arc<SessionState>,
    registry: Arc<Registry>,
    kind: String,
    context: Context,
}

impl FinishHandle {
    pub fn finish(&self) -> Result<FinishOutcome, LogoneError> {
        let entries = {
            let stacker = self.state.stacker.lock();
            if self.state.finished.swap(true, Ordering::AcqRel) {
                return Ok(FinishOutcome::AlreadyFinished);
            }
            stacker.entries().to_vec()
        };

        let (start_time, end_time, elapsed) = {
            let mut timer = self.state.timer.lock();
            timer.end();
            (timer.start_time()?, timer.end_time()?, timer.elapsed()?)
        };

        if entries.is_empty() {
            tracing::debug!(kind = %self.kind, "session finished without entries");
            return Ok(FinishOutcome::Empty);
        }

        let config = &self.registry.config;
        let lines = sanitize::run(&entries, config);
        if lines.is_empty() {
            tracing::debug!(kind = %self.kind, level = %config.log_level, "every entry was below the log level");
            return Ok(FinishOutcome::Filtered);
        }

        let severity = Severity::highest(lines.iter().map(|line| line.severity))?;
        let record = LoggerRecord {
            kind: self.kind.clone(),
            context: self.context.clone(),
            runtime: Runtime {
                severity,
                start_time,
                end_time,
                elapsed,
                lines,
            },
            config: Config::clone(config),
        };

        let (delivered, failed) = self.registry.deliver(&record);
        Ok(FinishOutcome::Emitted { delivered, failed })
    }
}

impl std::fmt::Debug for FinishHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinishHandle")
            .field("kind", &self.kind)
            .field("finished", &self.state.finished.load(Ordering::Relaxed))
            .finish()
    }
}

/// A registered listener. Dropping it keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "the listener stays registered until `unsubscribe` is called"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.listeners.write().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Adapter, StreamingAdapter};
    use crate::config::{ElapsedUnit, LogoneConfig};
    use crate::error::AdapterError;
    use crate::memory::MemoryAdapter;
    use crate::timer::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    struct Failing;

    impl Adapter for Failing {
        fn output(&self, _record: &LoggerRecord) -> Result<(), AdapterError> {
            Err("backend unavailable".into())
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct Panicking;

    impl Adapter for Panicking {
        fn output(&self, _record: &LoggerRecord) -> Result<(), AdapterError> {
            panic!("adapter bug")
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[test]
    fn finish_is_idempotent() {
        let memory = Arc::new(MemoryAdapter::new());
        let logone = Logone::new(memory.clone());
        let session = logone.start("job", ());
        session.logger().info("once");

        assert!(session.finish().unwrap().is_emitted());
        assert_eq!(session.finish().unwrap(), FinishOutcome::AlreadyFinished);
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn empty_and_filtered_sessions_emit_nothing() {
        let memory = Arc::new(MemoryAdapter::new());
        let logone = Logone::with_config(
            memory.clone(),
            LogoneConfig::default().log_level(Severity::Error),
        );

        let empty = logone.start("empty", ());
        assert_eq!(empty.finish().unwrap(), FinishOutcome::Empty);

        let quiet = logone.start("quiet", ());
        quiet.logger().info("below threshold");
        assert_eq!(quiet.finish().unwrap(), FinishOutcome::Filtered);

        assert!(memory.is_empty());
    }

    #[test]
    fn record_carries_runtime_and_config() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let memory = Arc::new(MemoryAdapter::new());
        let logone = Logone::with_clock(
            memory.clone(),
            LogoneConfig::default().elapsed_unit(ElapsedUnit::Millisecond),
            Arc::new(clock.clone()),
        );

        let session = logone.start("request", Context::new().with("id", 42));
        session.logger().info("a");
        session.logger().error("b");
        clock.advance(Duration::milliseconds(1500));
        session.finish().unwrap();

        let record = &memory.records()[0];
        assert_eq!(record.kind, "request");
        assert_eq!(record.context, Context::new().with("id", 42));
        assert_eq!(record.runtime.severity, Severity::Error);
        assert_eq!(record.runtime.start_time, start);
        assert_eq!(record.runtime.end_time, start + Duration::milliseconds(1500));
        assert_eq!(record.runtime.elapsed, 1500);
    }

    #[test]
    #[traced_test]
    fn failing_adapters_are_isolated() {
        let memory = Arc::new(MemoryAdapter::new());
        let logone = Logone::new(vec![
            AdapterHandle::from(Arc::new(Failing)),
            AdapterHandle::from(Arc::new(Panicking)),
            AdapterHandle::from(memory.clone()),
        ]);

        let session = logone.start("job", ());
        session.logger().warning("careful");
        let outcome = session.finish().unwrap();

        assert_eq!(outcome, FinishOutcome::Emitted { delivered: 1, failed: 2 });
        assert_eq!(memory.len(), 1);
        assert!(logs_contain("adapter failed to output record"));
        assert!(logs_contain("backend unavailable"));
        assert!(logs_contain("adapter panicked while outputting record"));
    }

    #[test]
    fn listeners_see_raw_entries_until_unsubscribed() {
        let logone = Logone::new(AdapterSet::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let subscription = logone.subscribe(move |entry| sink.lock().push(entry.message.clone()));
        assert_eq!(logone.listener_count(), 1);

        let session = logone.start("job", ());
        session.logger().debug("first");
        subscription.unsubscribe();
        session.logger().debug("second");

        assert_eq!(*seen.lock(), ["first"]);
        assert_eq!(logone.listener_count(), 0);
    }

    #[test]
    #[traced_test]
    fn panicking_listener_does_not_stop_others() {
        let logone = Logone::new(AdapterSet::default());
        let count = Arc::new(AtomicU64::new(0));

        let _noisy = logone.subscribe(|_| panic!("listener bug"));
        let counter = count.clone();
        let _quiet = logone.subscribe(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        let session = logone.start("job", ());
        session.logger().info("x");

        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(session.logger().entries().len(), 1);
        assert!(logs_contain("log listener panicked"));
    }

    #[test]
    fn listener_may_subscribe_during_fan_out() {
        let logone = Logone::new(AdapterSet::default());
        let inner = logone.clone();
        let _outer = logone.subscribe(move |_| {
            let _ = inner.subscribe(|_| {});
        });

        let session = logone.start("job", ());
        session.logger().info("x");
        assert_eq!(logone.listener_count(), 2);
    }

    #[test]
    fn streaming_adapters_receive_entries_with_config() {
        let memory = Arc::new(MemoryAdapter::new());
        let logone = Logone::with_config(
            AdapterHandle::streaming(memory.clone()),
            LogoneConfig::default().log_level(Severity::Warning),
        );

        let session = logone.start("job", ());
        session.logger().debug("raw, unfiltered");
        session.logger().error("kept");
        session.finish().unwrap();

        let live: Vec<_> = memory.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(live, ["raw, unfiltered", "kept"]);
        assert_eq!(memory.records()[0].runtime.lines.len(), 1);
    }

    struct RejectsEntries;

    impl Adapter for RejectsEntries {
        fn output(&self, _record: &LoggerRecord) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    impl StreamingAdapter for RejectsEntries {
        fn on_entry(&self, _entry: &LogEntry, _config: &Config) -> Result<(), AdapterError> {
            Err("stream closed".into())
        }
    }

    struct PanicsOnEntry;

    impl Adapter for PanicsOnEntry {
        fn output(&self, _record: &LoggerRecord) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    impl StreamingAdapter for PanicsOnEntry {
        fn on_entry(&self, _entry: &LogEntry, _config: &Config) -> Result<(), AdapterError> {
            panic!("streaming bug")
        }
    }

    #[test]
    #[traced_test]
    fn failing_streaming_adapters_are_isolated() {
        let memory = Arc::new(MemoryAdapter::new());
        let logone = Logone::new(vec![
            AdapterHandle::streaming(Arc::new(RejectsEntries)),
            AdapterHandle::streaming(Arc::new(PanicsOnEntry)),
            AdapterHandle::streaming(memory.clone()),
        ]);
        let seen = Arc::new(AtomicU64::new(0));
        let counter = seen.clone();
        let _listener = logone.subscribe(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        let session = logone.start("job", ());
        session.logger().info("one");
        session.logger().error("two");

        let live: Vec<_> = memory.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(live, ["one", "two"]);
        assert_eq!(seen.load(Ordering::Relaxed), 2);
        assert_eq!(session.logger().entries().len(), 2);

        let outcome = session.finish().unwrap();
        assert_eq!(outcome, FinishOutcome::Emitted { delivered: 3, failed: 0 });
        assert_eq!(memory.len(), 1);
        assert!(logs_contain("adapter failed to receive entry"));
        assert!(logs_contain("stream closed"));
        assert!(logs_contain("adapter panicked while receiving entry"));
    }

    #[test]
    fn added_adapter_receives_later_records() {
        let logone = Logone::new(AdapterSet::default());
        let session = logone.start("job", ());
        session.logger().info("x");

        let memory = Arc::new(MemoryAdapter::new());
        logone.add_adapter(memory.clone());
        assert_eq!(logone.adapter_count(), 1);

        session.finish().unwrap();
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn entries_after_finish_are_dropped() {
        let logone = Logone::new(AdapterSet::default());
        let (logger, finish) = logone.start("job", ()).into_parts();
        logger.info("before");
        finish.finish().unwrap();
        logger.info("after");
        assert_eq!(logger.entries().len(), 1);
    }
}
