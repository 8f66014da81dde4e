//! # qlog
//!
//! Structured logging for request handlers.
//!
//! A [`Logger`] borrows the request context it serves and attaches the
//! request id and service name to every record it emits. Three context
//! shapes are recognised (see [`LoggingContext`]); anything else logs
//! without request fields.
//!
//! ## Features
//!
//! - **Request fields**: `x-request-id` and `service` extracted per call
//! - **Debug bypass**: setting `QLOG_DEBUG` sends plain formatted lines to stderr
//!   (the Go `qlog` package read `GO_DEBUG`; set [`LoggerConfig::bypass_var`]
//!   to keep that name)
//! - **Printf formatting**: `%d`, `%s`, `%v` and friends, never failing on bad input
//! - **JSON merge**: [`Logger::info_json`] appends a validated JSON document
//! - **Engine**: sync or async writer with console and file appenders
//!
//! ## Example
//!
//! ```
//! use qlog::prelude::*;
//! use std::sync::Arc;
//!
//! struct Request {
//!     id: String,
//! }
//!
//! impl RequestValues for Request {
//!     fn get_string(&self, key: &str) -> Option<&str> {
//!         (key == "request_id").then_some(self.id.as_str())
//!     }
//! }
//!
//! impl LoggingContext for Request {
//!     fn request_values(&self) -> Option<&dyn RequestValues> {
//!         Some(self)
//!     }
//! }
//!
//! let engine = Arc::new(Engine::new());
//! let base = Logger::builder().engine(engine).build().unwrap();
//!
//! let request = Request { id: "req-7".to_string() };
//! let logger = base.with_context(&request);
//! assert_eq!(logger.context_fields().get("x-request-id").and_then(|v| v.as_str()), Some("req-7"));
//!
//! qlog::info!(logger, "handled in %dms", 12);
//! ```

pub mod appenders;
pub mod core;
pub mod macros;

pub mod prelude {
    pub use crate::appenders::{ConsoleAppender, ConsoleTarget, FileAppender};
    pub use crate::core::{
        Appender, Engine, EngineBuilder, EnvSource, FieldSet, FieldValue, FormatArg, LogEntry,
        LogLevel, Logger, LoggerBuilder, LoggerConfig, LoggerError, LoggerExtras, LoggingContext,
        MapEnv, MatchPolicy, MemorySink, OutputFormat, RequestValues, Result, StructuredEngine,
        TimestampFormat, UserValues,
    };
}

pub use appenders::{ConsoleAppender, ConsoleTarget, FileAppender};
pub use core::{
    is_valid_json, sprintf, user_value_str, Appender, ContextAdapter, Engine, EngineBuilder,
    EngineMetrics, EnvSource, EnvironmentEnricher, FatalHook, FieldSet, FieldValue, FormatArg,
    LevelGate, LogEntry, LogLevel, Logger, LoggerBuilder, LoggerConfig, LoggerError, LoggerExtras,
    LoggingContext, MapEnv, MatchPolicy, MemorySink, OutputFormat, ProcessEnv, RawSink,
    RecordBuilder, RequestValues, Result, StderrSink, StructuredEngine, TimestampFormat,
    UserValues, DEFAULT_BYPASS_VAR, DEFAULT_SERVICE_VAR, DEFAULT_SHUTDOWN_TIMEOUT,
};
