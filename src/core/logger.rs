//! Request-scoped logging facade
//!
//! A [`Logger`] pairs a [`StructuredEngine`] with one borrowed request
//! context. Every call runs the same pipeline:
//!
//! 1. if the bypass variable is set, write the formatted message to the raw
//!    sink and stop
//! 2. extract fields from the context (request id, service name)
//! 3. format the message with its positional arguments
//! 4. hand message and fields to the engine at the call's level

use super::{
    context::LoggingContext,
    context_adapter::{ContextAdapter, MatchPolicy},
    engine::{Engine, StructuredEngine},
    env::{EnvSource, EnvironmentEnricher, ProcessEnv, DEFAULT_SERVICE_VAR},
    error::{LoggerError, Result},
    field_set::{FieldSet, FieldValue},
    level_gate::{LevelGate, RawSink, StderrSink, DEFAULT_BYPASS_VAR},
    log_level::LogLevel,
    printf::{sprintf, FormatArg},
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

/// Names of the variables the facade reads, and the context match policy
///
/// # Example
///
/// ```
/// use qlog::{LoggerConfig, MatchPolicy};
///
/// let config: LoggerConfig = serde_json::from_str(r#"{"service_var": "APP_NAME"}"#).unwrap();
/// assert_eq!(config.service_var, "APP_NAME");
/// assert_eq!(config.bypass_var, "QLOG_DEBUG");
/// assert_eq!(config.match_policy, MatchPolicy::FirstMatch);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Variable whose presence turns on the raw-output bypass
    pub bypass_var: String,
    /// Variable holding the value of the `service` field
    pub service_var: String,
    pub match_policy: MatchPolicy,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            bypass_var: DEFAULT_BYPASS_VAR.to_string(),
            service_var: DEFAULT_SERVICE_VAR.to_string(),
            match_policy: MatchPolicy::default(),
        }
    }
}

impl LoggerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bypass_var.trim().is_empty() {
            return Err(LoggerError::config("LoggerConfig", "bypass_var must not be empty"));
        }
        if self.service_var.trim().is_empty() {
            return Err(LoggerError::config("LoggerConfig", "service_var must not be empty"));
        }
        Ok(())
    }
}

/// Logging facade bound to one request context
///
/// Cheap to derive per request from a shared base logger with
/// [`with_context`](Self::with_context).
///
/// # Example
///
/// ```
/// use qlog::prelude::*;
/// use std::sync::Arc;
///
/// let base = Logger::builder()
///     .engine(Arc::new(Engine::new()))
///     .env(MapEnv::new().with_var("SERVICE_NAME", "orders"))
///     .build()
///     .unwrap();
///
/// base.info("listening on port %d", &[8080.into()]);
/// assert!(!base.debug_enabled());
/// ```
#[derive(Clone)]
pub struct Logger<'ctx> {
    engine: Arc<dyn StructuredEngine>,
    context: Option<&'ctx dyn LoggingContext>,
    gate: LevelGate,
    adapter: ContextAdapter,
}

impl<'ctx> Logger<'ctx> {
    /// Logger over `engine` and `context`, configured from the process environment
    pub fn new(engine: Arc<dyn StructuredEngine>, context: &'ctx dyn LoggingContext) -> Self {
        Logger::detached(engine).with_context(context)
    }

    /// JSON records at `Info` and above on stderr
    pub fn production(context: &'ctx dyn LoggingContext) -> Self {
        Self::new(Arc::new(Engine::production()), context)
    }

    pub fn builder() -> LoggerBuilder<'ctx> {
        LoggerBuilder::new()
    }

    /// The same logger reading fields from another context
    pub fn with_context<'a>(&self, context: &'a dyn LoggingContext) -> Logger<'a> {
        Logger {
            engine: Arc::clone(&self.engine),
            context: Some(context),
            gate: self.gate.clone(),
            adapter: self.adapter.clone(),
        }
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn engine(&self) -> &Arc<dyn StructuredEngine> {
        &self.engine
    }

    /// Fields the current context contributes to each record
    pub fn context_fields(&self) -> FieldSet {
        self.adapter.extract(self.context)
    }

    /// Emit `message` at `level`, formatting it with `args`
    pub fn log(&self, level: LogLevel, message: &str, args: &[FormatArg]) {
        if self.try_bypass(|| sprintf(message, args)) {
            return;
        }

        let fields = self.context_fields();
        let message = if args.is_empty() {
            Cow::Borrowed(message)
        } else {
            Cow::Owned(sprintf(message, args))
        };
        self.engine.emit(level, &message, fields);
    }

    #[inline]
    pub fn debug(&self, message: &str, args: &[FormatArg]) {
        self.log(LogLevel::Debug, message, args);
    }

    #[inline]
    pub fn info(&self, message: &str, args: &[FormatArg]) {
        self.log(LogLevel::Info, message, args);
    }

    #[inline]
    pub fn warn(&self, message: &str, args: &[FormatArg]) {
        self.log(LogLevel::Warn, message, args);
    }

    #[inline]
    pub fn error(&self, message: &str, args: &[FormatArg]) {
        self.log(LogLevel::Error, message, args);
    }

    /// Panics afterwards when the engine runs in development mode
    #[inline]
    pub fn dpanic(&self, message: &str, args: &[FormatArg]) {
        self.log(LogLevel::DPanic, message, args);
    }

    /// The engine panics after writing the record
    #[inline]
    pub fn panic(&self, message: &str, args: &[FormatArg]) {
        self.log(LogLevel::Panic, message, args);
    }

    /// The engine terminates the process after writing the record
    #[inline]
    pub fn fatal(&self, message: &str, args: &[FormatArg]) {
        self.log(LogLevel::Fatal, message, args);
    }

    /// Start a record carrying caller-supplied fields
    ///
    /// # Example
    ///
    /// ```
    /// use qlog::prelude::*;
    /// use std::sync::Arc;
    ///
    /// let logger = Logger::builder().engine(Arc::new(Engine::new())).build().unwrap();
    /// logger
    ///     .record(LogLevel::Info)
    ///     .message("charged %s")
    ///     .arg("card-1234")
    ///     .field("amount_cents", 4200)
    ///     .emit();
    /// ```
    pub fn record(&self, level: LogLevel) -> RecordBuilder<'_, 'ctx> {
        RecordBuilder::new(self, level)
    }

    /// Whether the engine would write `Debug` records
    ///
    /// Independent of the bypass; use it to skip building expensive payloads.
    pub fn debug_enabled(&self) -> bool {
        self.engine.would_emit(LogLevel::Debug)
    }

    /// Flush the engine
    pub fn sync(&self) -> Result<()> {
        self.engine.flush()
    }

    /// Write `raw()` to the raw sink if the bypass is active
    pub(super) fn try_bypass(&self, raw: impl FnOnce() -> String) -> bool {
        if !self.gate.should_bypass() {
            return false;
        }
        self.gate.write_raw(&raw());
        true
    }

    pub(super) fn emit_fields(&self, level: LogLevel, message: &str, fields: FieldSet) {
        self.engine.emit(level, message, fields);
    }
}

impl Logger<'static> {
    /// Logger without a request context
    pub fn detached(engine: Arc<dyn StructuredEngine>) -> Self {
        let env: Arc<dyn EnvSource> = Arc::new(ProcessEnv);
        let config = LoggerConfig::default();
        Logger {
            engine,
            context: None,
            gate: LevelGate::new(Arc::clone(&env), config.bypass_var, Arc::new(StderrSink)),
            adapter: ContextAdapter::new(
                EnvironmentEnricher::new(env, config.service_var),
                config.match_policy,
            ),
        }
    }
}

impl std::fmt::Debug for Logger<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("has_context", &self.context.is_some())
            .field("gate", &self.gate)
            .field("adapter", &self.adapter)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`Logger`]
pub struct LoggerBuilder<'ctx> {
    engine: Option<Arc<dyn StructuredEngine>>,
    context: Option<&'ctx dyn LoggingContext>,
    config: LoggerConfig,
    env: Option<Arc<dyn EnvSource>>,
    raw_sink: Option<Arc<dyn RawSink>>,
}

impl<'ctx> LoggerBuilder<'ctx> {
    pub fn new() -> Self {
        Self {
            engine: None,
            context: None,
            config: LoggerConfig::default(),
            env: None,
            raw_sink: None,
        }
    }

    /// Engine to emit through; defaults to [`Engine::production`]
    #[must_use = "builder methods return a new value"]
    pub fn engine(mut self, engine: Arc<dyn StructuredEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn context(mut self, context: &'ctx dyn LoggingContext) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn match_policy(mut self, policy: MatchPolicy) -> Self {
        self.config.match_policy = policy;
        self
    }

    /// Source for the bypass and service variables; defaults to the process environment
    #[must_use = "builder methods return a new value"]
    pub fn env<E: EnvSource + 'static>(mut self, env: E) -> Self {
        self.env = Some(Arc::new(env));
        self
    }

    /// Destination of bypass output; defaults to stderr
    #[must_use = "builder methods return a new value"]
    pub fn raw_sink<S: RawSink + 'static>(mut self, sink: S) -> Self {
        self.raw_sink = Some(Arc::new(sink));
        self
    }

    pub fn build(self) -> Result<Logger<'ctx>> {
        self.config.validate()?;

        let engine: Arc<dyn StructuredEngine> = match self.engine {
            Some(engine) => engine,
            None => Arc::new(Engine::production()),
        };
        let env: Arc<dyn EnvSource> = match self.env {
            Some(env) => env,
            None => Arc::new(ProcessEnv),
        };
        let sink: Arc<dyn RawSink> = match self.raw_sink {
            Some(sink) => sink,
            None => Arc::new(StderrSink),
        };

        Ok(Logger {
            engine,
            context: self.context,
            gate: LevelGate::new(Arc::clone(&env), self.config.bypass_var, sink),
            adapter: ContextAdapter::new(
                EnvironmentEnricher::new(env, self.config.service_var),
                self.config.match_policy,
            ),
        })
    }
}

impl Default for LoggerBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single record with caller-supplied fields
///
/// Caller fields are appended after the context fields, in call order.
pub struct RecordBuilder<'l, 'ctx> {
    logger: &'l Logger<'ctx>,
    level: LogLevel,
    message: String,
    args: Vec<FormatArg>,
    fields: FieldSet,
}

impl<'l, 'ctx> RecordBuilder<'l, 'ctx> {
    fn new(logger: &'l Logger<'ctx>, level: LogLevel) -> Self {
        Self {
            logger,
            level,
            message: String::new(),
            args: Vec::new(),
            fields: FieldSet::new(),
        }
    }

    /// Set the message (a format string when arguments are added)
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add a positional format argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<FormatArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add a structured field
    #[must_use]
    pub fn field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.push(key, value);
        self
    }

    /// Send the record through the logger's pipeline
    pub fn emit(self) {
        let caller_fields = self.fields;
        let bypassed = self.logger.try_bypass(|| {
            let raw = sprintf(&self.message, &self.args);
            if caller_fields.is_empty() {
                raw
            } else {
                format!("{} {}", raw, caller_fields.format_fields())
            }
        });
        if bypassed {
            return;
        }

        let message = if self.args.is_empty() {
            self.message
        } else {
            sprintf(&self.message, &self.args)
        };
        let mut fields = self.logger.context_fields();
        fields.extend(caller_fields);
        self.logger.emit_fields(self.level, &message, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::env::MapEnv;
    use crate::core::level_gate::MemorySink;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        records: Mutex<Vec<(LogLevel, String, FieldSet)>>,
    }

    impl StructuredEngine for Recorder {
        fn emit(&self, level: LogLevel, message: &str, fields: FieldSet) {
            self.records.lock().push((level, message.to_string(), fields));
        }

        fn would_emit(&self, level: LogLevel) -> bool {
            level >= LogLevel::Info
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }
    }

    fn logger(engine: &Arc<Recorder>, env: &MapEnv, sink: &MemorySink) -> Logger<'static> {
        Logger::builder()
            .engine(engine.clone())
            .env(env.clone())
            .raw_sink(sink.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_message_formatted_only_with_args() {
        let engine = Arc::new(Recorder::default());
        let log = logger(&engine, &MapEnv::new(), &MemorySink::new());

        log.info("100%", &[]);
        log.warn("%d%%", &[50.into()]);

        let records = engine.records.lock();
        assert_eq!(records[0].1, "100%");
        assert_eq!(records[1], (LogLevel::Warn, "50%".to_string(), FieldSet::new()));
    }

    #[test]
    fn test_bypass_formats_even_without_args() {
        let engine = Arc::new(Recorder::default());
        let env = MapEnv::new().with_var("QLOG_DEBUG", "1");
        let sink = MemorySink::new();
        let log = logger(&engine, &env, &sink);

        log.error("100%", &[]);
        log.record(LogLevel::Error).message("100%").emit();
        assert_eq!(sink.lines(), vec!["100%!(NOVERB)", "100%!(NOVERB)"]);
        assert!(engine.records.lock().is_empty());
    }

    #[test]
    fn test_bypass_var_is_configurable() {
        let engine = Arc::new(Recorder::default());
        let env = MapEnv::new().with_var("GO_DEBUG", "1");
        let sink = MemorySink::new();
        let log = Logger::builder()
            .engine(engine.clone())
            .config(LoggerConfig {
                bypass_var: "GO_DEBUG".to_string(),
                ..LoggerConfig::default()
            })
            .env(env.clone())
            .raw_sink(sink.clone())
            .build()
            .unwrap();

        log.info("raw %s", &["line".into()]);
        assert_eq!(sink.lines(), vec!["raw line"]);

        // The default name is not consulted once another is configured
        env.remove("GO_DEBUG");
        env.set("QLOG_DEBUG", "1");
        log.info("structured", &[]);
        assert_eq!(engine.records.lock().len(), 1);
    }

    #[test]
    fn test_record_builder_appends_caller_fields() {
        let engine = Arc::new(Recorder::default());
        let log = logger(&engine, &MapEnv::new(), &MemorySink::new());

        log.record(LogLevel::Error)
            .message("retry %d of %d")
            .arg(2)
            .arg(5)
            .field("job", "sync")
            .field("job", "again")
            .emit();

        let records = engine.records.lock();
        let (level, message, fields) = &records[0];
        assert_eq!(*level, LogLevel::Error);
        assert_eq!(message, "retry 2 of 5");
        assert_eq!(fields.count("job"), 2);
    }

    #[test]
    fn test_record_builder_bypass_keeps_caller_fields() {
        let engine = Arc::new(Recorder::default());
        let env = MapEnv::new().with_var("QLOG_DEBUG", "");
        let sink = MemorySink::new();
        let log = logger(&engine, &env, &sink);

        log.record(LogLevel::Info).message("paid").field("order", 7).emit();
        assert_eq!(sink.lines(), vec!["paid order=7"]);
        assert!(engine.records.lock().is_empty());
    }

    #[test]
    fn test_config_validation() {
        let config = LoggerConfig {
            bypass_var: " ".to_string(),
            ..LoggerConfig::default()
        };
        let err = Logger::builder().config(config).build().unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_debug_enabled_follows_engine() {
        let engine = Arc::new(Recorder::default());
        let log = logger(&engine, &MapEnv::new().with_var("QLOG_DEBUG", "1"), &MemorySink::new());
        assert!(!log.debug_enabled());
        assert!(log.sync().is_ok());
    }
}
