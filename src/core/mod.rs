//! Core logger types and traits

pub mod appender;
pub mod context;
pub mod context_adapter;
pub mod engine;
pub mod env;
pub mod error;
pub mod field_set;
pub mod json_merge;
pub mod level_gate;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod output_format;
pub mod printf;
pub mod timestamp;

pub use appender::Appender;
pub use context::{user_value_str, LoggingContext, RequestValues, UserValues};
pub use context_adapter::{ContextAdapter, MatchPolicy, KEY_X_REQUEST_ID, REQUEST_ID_LOOKUP};
pub use engine::{Engine, EngineBuilder, FatalHook, StructuredEngine, DEFAULT_SHUTDOWN_TIMEOUT};
pub use env::{EnvSource, EnvironmentEnricher, MapEnv, ProcessEnv, DEFAULT_SERVICE_VAR, KEY_SERVICE};
pub use error::{LoggerError, Result};
pub use field_set::{FieldSet, FieldValue};
pub use json_merge::{is_valid_json, LoggerExtras};
pub use level_gate::{LevelGate, MemorySink, RawSink, StderrSink, DEFAULT_BYPASS_VAR};
pub use log_entry::LogEntry;
pub use log_level::LogLevel;
pub use logger::{Logger, LoggerBuilder, LoggerConfig, RecordBuilder};
pub use metrics::EngineMetrics;
pub use output_format::{OutputFormat, MESSAGE_KEY};
pub use printf::{sprintf, FormatArg};
pub use timestamp::TimestampFormat;
