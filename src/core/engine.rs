//! Structured engine
//!
//! [`StructuredEngine`] is the contract the [`Logger`](super::logger::Logger)
//! facade emits through: level threshold, encoding and output are its
//! business. [`Engine`] is the bundled implementation, writing [`LogEntry`]
//! records to a list of [`Appender`]s either synchronously or through a
//! bounded queue drained by a worker thread.

use super::{
    appender::Appender,
    error::{LoggerError, Result},
    field_set::FieldSet,
    log_entry::LogEntry,
    log_level::LogLevel,
    metrics::EngineMetrics,
    output_format::OutputFormat,
};
use crate::appenders::ConsoleAppender;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default shutdown timeout for engine cleanup (5 seconds)
///
/// Used when the engine is dropped without explicit shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Called after a `Fatal` record is written, with the record's message
///
/// The default hook exits the process with status 1.
pub type FatalHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Backend accepting fully assembled records
pub trait StructuredEngine: Send + Sync {
    /// Emit `message` at `level` carrying `fields`
    ///
    /// Records below the engine's threshold are discarded. `DPanic`, `Panic`
    /// and `Fatal` may not return, depending on the engine.
    fn emit(&self, level: LogLevel, message: &str, fields: FieldSet);

    /// Whether a record at `level` would be written
    fn would_emit(&self, level: LogLevel) -> bool;

    /// Flush buffered output
    fn flush(&self) -> Result<()>;
}

impl<E: StructuredEngine + ?Sized> StructuredEngine for Arc<E> {
    fn emit(&self, level: LogLevel, message: &str, fields: FieldSet) {
        (**self).emit(level, message, fields)
    }

    fn would_emit(&self, level: LogLevel) -> bool {
        (**self).would_emit(level)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

type SharedAppenders = Arc<RwLock<Vec<Box<dyn Appender>>>>;

/// Message from callers to the writer thread
enum Command {
    Write(LogEntry),
    /// Answered once every record queued before it has been written
    Drain(Sender<()>),
}

pub struct Engine {
    min_level: RwLock<LogLevel>,
    appenders: SharedAppenders,
    sender: Option<Sender<Command>>,
    worker: Option<thread::JoinHandle<()>>,
    metrics: Arc<EngineMetrics>,
    /// Panic on `DPanic` records
    development: bool,
    on_fatal: FatalHook,
}

impl Engine {
    /// Synchronous engine at `Info` with no appenders
    #[must_use]
    pub fn new() -> Self {
        Self {
            min_level: RwLock::new(LogLevel::Info),
            appenders: Arc::new(RwLock::new(Vec::new())),
            sender: None,
            worker: None,
            metrics: Arc::new(EngineMetrics::new()),
            development: false,
            on_fatal: default_fatal_hook(),
        }
    }

    /// Engine whose records are written by a worker thread
    ///
    /// `buffer_size` bounds the queue between callers and the worker.
    #[must_use]
    pub fn with_async(buffer_size: usize) -> Self {
        let (sender, receiver) = bounded(buffer_size);
        let appenders: SharedAppenders = Arc::new(RwLock::new(Vec::new()));
        let metrics = Arc::new(EngineMetrics::new());

        let worker = {
            let appenders = Arc::clone(&appenders);
            let metrics = Arc::clone(&metrics);
            thread::Builder::new()
                .name("qlog-writer".to_string())
                .spawn(move || Self::run_worker(receiver, appenders, metrics))
        };
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!(
                    "[LOGGER ERROR] Failed to spawn writer thread, falling back to sync mode: {}",
                    e
                );
                None
            }
        };

        Self {
            min_level: RwLock::new(LogLevel::Info),
            appenders,
            sender: worker.as_ref().map(|_| sender),
            worker,
            metrics,
            development: false,
            on_fatal: default_fatal_hook(),
        }
    }

    /// JSON records at `Info` and above to stderr
    #[must_use]
    pub fn production() -> Self {
        Self::builder()
            .min_level(LogLevel::Info)
            .appender(ConsoleAppender::stderr().with_output_format(OutputFormat::Json))
            .build()
    }

    /// Text records at `Debug` and above to stderr; `DPanic` panics
    #[must_use]
    pub fn development() -> Self {
        Self::builder()
            .min_level(LogLevel::Debug)
            .appender(ConsoleAppender::stderr())
            .development(true)
            .build()
    }

    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn add_appender(&self, appender: Box<dyn Appender>) {
        self.appenders.write().push(appender);
    }

    pub fn set_min_level(&self, level: LogLevel) {
        *self.min_level.write() = level;
    }

    pub fn min_level(&self) -> LogLevel {
        *self.min_level.read()
    }

    pub fn is_development(&self) -> bool {
        self.development
    }

    pub fn is_async(&self) -> bool {
        self.sender.is_some()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    fn run_worker(receiver: Receiver<Command>, appenders: SharedAppenders, metrics: Arc<EngineMetrics>) {
        const BATCH_SIZE: usize = 50;
        const BATCH_TIMEOUT_MS: u64 = 10;

        let mut batch = Vec::with_capacity(BATCH_SIZE);

        // Ends when every sender is dropped and the queue is drained.
        while let Ok(command) = receiver.recv() {
            let mut drain_ack = None;
            match command {
                Command::Write(entry) => batch.push(entry),
                Command::Drain(ack) => drain_ack = Some(ack),
            }
            Self::fill_batch(&receiver, &mut batch, &mut drain_ack, BATCH_SIZE);

            if batch.len() < BATCH_SIZE && drain_ack.is_none() {
                // Small batch: give producers a moment to fill it
                thread::sleep(Duration::from_millis(BATCH_TIMEOUT_MS));
                Self::fill_batch(&receiver, &mut batch, &mut drain_ack, BATCH_SIZE);
            }

            if !batch.is_empty() {
                Self::process_batch(&appenders, &batch, &metrics);
                batch.clear();
            }
            if let Some(ack) = drain_ack {
                // The requester may have timed out and gone away
                let _ = ack.send(());
            }
        }
    }

    /// Take queued records until the batch is full or a drain request arrives
    fn fill_batch(
        receiver: &Receiver<Command>,
        batch: &mut Vec<LogEntry>,
        drain_ack: &mut Option<Sender<()>>,
        batch_size: usize,
    ) {
        while batch.len() < batch_size && drain_ack.is_none() {
            match receiver.try_recv() {
                Ok(Command::Write(entry)) => batch.push(entry),
                Ok(Command::Drain(ack)) => *drain_ack = Some(ack),
                Err(_) => break,
            }
        }
    }

    /// Block until the writer thread has written every queued record
    ///
    /// A no-op for synchronous engines.
    fn drain_queue(&self) -> Result<()> {
        let Some(ref sender) = self.sender else {
            return Ok(());
        };

        let (ack_tx, ack_rx) = bounded(1);
        sender
            .send_timeout(Command::Drain(ack_tx), DEFAULT_SHUTDOWN_TIMEOUT)
            .map_err(|_| LoggerError::writer("writer thread did not accept drain request"))?;
        ack_rx
            .recv_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
            .map_err(|_| LoggerError::writer("writer thread did not drain the queue"))
    }

    /// Flush every appender, returning the first failure
    fn flush_appenders(&self) -> Result<()> {
        let mut appenders = self.appenders.write();
        let mut first_error = None;
        for appender in appenders.iter_mut() {
            if let Err(e) = appender.flush() {
                let err = LoggerError::flush(appender.name(), e.to_string());
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Write a batch and flush, isolating each appender
    fn process_batch(appenders: &SharedAppenders, batch: &[LogEntry], metrics: &EngineMetrics) {
        let mut guard = appenders.write();
        for entry in batch {
            Self::process_sync(&mut guard, entry, metrics);
        }
        for (idx, appender) in guard.iter_mut().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| appender.flush()));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    metrics.record_appender_failure();
                    eprintln!("[LOGGER ERROR] Appender #{} flush failed: {}", idx, e);
                }
                Err(panic_info) => {
                    metrics.record_appender_failure();
                    eprintln!(
                        "[LOGGER CRITICAL] Appender #{} panicked during flush: {}. \
                         Other appenders continue to function.",
                        idx,
                        panic_message(panic_info.as_ref())
                    );
                }
            }
        }
    }

    /// Write one entry to every appender
    ///
    /// A failing or panicking appender does not stop the others. Returns
    /// `true` if any appender failed.
    fn process_sync(appenders: &mut [Box<dyn Appender>], entry: &LogEntry, metrics: &EngineMetrics) -> bool {
        let mut has_error = false;

        for (idx, appender) in appenders.iter_mut().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| appender.append(entry)));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!("[LOGGER ERROR] Appender '{}' failed: {}", appender.name(), e);
                    has_error = true;
                }
                Err(panic_info) => {
                    eprintln!(
                        "[LOGGER CRITICAL] Appender #{} panicked: {}. \
                         Other appenders continue to function.",
                        idx,
                        panic_message(panic_info.as_ref())
                    );
                    has_error = true;
                }
            }
        }

        if has_error {
            metrics.record_appender_failure();
            metrics.record_dropped();
        } else {
            metrics.record_written();
        }
        has_error
    }

    fn write_now(&self, entry: &LogEntry) {
        let mut appenders = self.appenders.write();
        Self::process_sync(&mut appenders, entry, &self.metrics);
    }

    fn send_entry(&self, entry: LogEntry) {
        // Records that may end the thread or process never wait in the queue,
        // but everything queued before them is written first.
        if entry.level >= LogLevel::DPanic {
            if let Err(e) = self.drain_queue() {
                eprintln!("[LOGGER ERROR] Failed to drain queue before {} record: {}", entry.level, e);
            }
            self.write_now(&entry);
            if let Err(e) = self.flush_appenders() {
                eprintln!("[LOGGER ERROR] Failed to flush {} record: {}", entry.level, e);
            }
            return;
        }

        let Some(ref sender) = self.sender else {
            self.write_now(&entry);
            return;
        };

        match sender.try_send(Command::Write(entry)) {
            Ok(()) => {}
            Err(TrySendError::Full(Command::Write(entry))) => {
                self.metrics.record_queue_full();
                if entry.level >= LogLevel::Error {
                    self.metrics.record_forced_write();
                    self.write_now(&entry);
                } else {
                    let dropped = self.metrics.record_dropped();
                    // Alert on first drop and periodically thereafter
                    if dropped == 0 || (dropped + 1) % 1000 == 0 {
                        eprintln!(
                            "[LOGGER WARNING] Queue full, {} logs dropped. \
                             Consider increasing the async buffer size.",
                            dropped + 1
                        );
                    }
                }
            }
            Err(TrySendError::Full(Command::Drain(_))) => {}
            Err(TrySendError::Disconnected(_)) => {
                self.metrics.record_dropped();
            }
        }
    }

    /// Control flow that follows a written record
    fn after_write(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::DPanic if self.development => panic!("{}", message),
            LogLevel::Panic => panic!("{}", message),
            LogLevel::Fatal => (self.on_fatal)(message),
            _ => {}
        }
    }

    /// Gracefully shut down the worker thread, waiting at most `timeout`
    ///
    /// Returns `true` if every queued record was written and flushed.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        // Closing the channel lets the worker drain and exit
        drop(self.sender.take());

        if let Some(handle) = self.worker.take() {
            let start = std::time::Instant::now();
            while !handle.is_finished() {
                if start.elapsed() >= timeout {
                    eprintln!(
                        "[LOGGER WARNING] Writer thread did not finish within {:?}. \
                         Some logs may be lost.",
                        timeout
                    );
                    return false;
                }
                thread::sleep(Duration::from_millis(10));
            }
            if let Err(e) = handle.join() {
                eprintln!("[LOGGER ERROR] Writer thread panicked during shutdown: {:?}", e);
                return false;
            }
        }

        if let Err(e) = self.flush_appenders() {
            eprintln!("[LOGGER ERROR] Failed to flush during shutdown: {}", e);
            return false;
        }
        true
    }
}

impl StructuredEngine for Engine {
    fn emit(&self, level: LogLevel, message: &str, fields: FieldSet) {
        if self.would_emit(level) {
            self.send_entry(LogEntry::new(level, message).with_fields(fields));
        } else if level >= LogLevel::DPanic {
            if let Err(e) = self.flush() {
                eprintln!("[LOGGER ERROR] Failed to flush before filtered {} record: {}", level, e);
            }
        }
        // Terminal levels take effect even when the record is filtered out.
        self.after_write(level, message);
    }

    fn would_emit(&self, level: LogLevel) -> bool {
        level >= *self.min_level.read()
    }

    /// Write every queued record, then flush every appender
    ///
    /// Returns the first failure.
    fn flush(&self) -> Result<()> {
        self.drain_queue()?;
        self.flush_appenders()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);

        let dropped = self.metrics.dropped();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Engine shutting down with {} dropped logs (drop rate: {:.2}%)",
                dropped,
                self.metrics.drop_rate()
            );
        }
    }
}

fn default_fatal_hook() -> FatalHook {
    Arc::new(|_: &str| std::process::exit(1))
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Builder for constructing an [`Engine`]
///
/// # Example
/// ```
/// use qlog::prelude::*;
///
/// let engine = Engine::builder()
///     .min_level(LogLevel::Debug)
///     .appender(ConsoleAppender::stdout())
///     .async_mode(1000)
///     .build();
/// assert!(engine.would_emit(LogLevel::Debug));
/// ```
pub struct EngineBuilder {
    min_level: LogLevel,
    appenders: Vec<Box<dyn Appender>>,
    async_buffer: Option<usize>,
    development: bool,
    on_fatal: Option<FatalHook>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            min_level: LogLevel::Info,
            appenders: Vec::new(),
            async_buffer: None,
            development: false,
            on_fatal: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn appender<A: Appender + 'static>(mut self, appender: A) -> Self {
        self.appenders.push(Box::new(appender));
        self
    }

    /// Write records from a worker thread through a queue of `buffer_size`
    ///
    /// If not called, the engine writes synchronously.
    #[must_use = "builder methods return a new value"]
    pub fn async_mode(mut self, buffer_size: usize) -> Self {
        self.async_buffer = Some(buffer_size);
        self
    }

    /// Panic on `DPanic` records
    #[must_use = "builder methods return a new value"]
    pub fn development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    /// Replace the default process exit after `Fatal` records
    #[must_use = "builder methods return a new value"]
    pub fn on_fatal(mut self, hook: FatalHook) -> Self {
        self.on_fatal = Some(hook);
        self
    }

    pub fn build(self) -> Engine {
        let mut engine = match self.async_buffer {
            Some(size) => Engine::with_async(size),
            None => Engine::new(),
        };

        engine.set_min_level(self.min_level);
        engine.development = self.development;
        if let Some(hook) = self.on_fatal {
            engine.on_fatal = hook;
        }
        for appender in self.appenders {
            engine.add_appender(appender);
        }
        engine
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
