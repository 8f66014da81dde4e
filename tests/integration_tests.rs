//! Integration tests for qlog
//!
//! These tests verify:
//! - Records from the facade carry request fields
//! - Debug bypass short-circuits the engine
//! - JSON merge on valid and malformed documents
//! - Terminal levels and the fatal hook
//! - File output through sync and async engines

use parking_lot::Mutex;
use qlog::prelude::*;
use qlog::FatalHook;
use serde_json::{json, Value};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Engine that keeps every record in memory
#[derive(Default)]
struct RecordingEngine {
    records: Mutex<Vec<(LogLevel, String, FieldSet)>>,
    flushes: AtomicUsize,
}

impl RecordingEngine {
    fn records(&self) -> Vec<(LogLevel, String, FieldSet)> {
        self.records.lock().clone()
    }
}

impl StructuredEngine for RecordingEngine {
    fn emit(&self, level: LogLevel, message: &str, fields: FieldSet) {
        self.records.lock().push((level, message.to_string(), fields));
    }

    fn would_emit(&self, level: LogLevel) -> bool {
        level >= LogLevel::Debug
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingFlush;

impl StructuredEngine for FailingFlush {
    fn emit(&self, _level: LogLevel, _message: &str, _fields: FieldSet) {}

    fn would_emit(&self, _level: LogLevel) -> bool {
        false
    }

    fn flush(&self) -> Result<()> {
        Err(LoggerError::flush("remote", "connection reset"))
    }
}

struct Request {
    id: &'static str,
}

impl RequestValues for Request {
    fn get_string(&self, key: &str) -> Option<&str> {
        (key == "request_id").then_some(self.id)
    }
}

impl LoggingContext for Request {
    fn request_values(&self) -> Option<&dyn RequestValues> {
        Some(self)
    }
}

fn setup(env: &MapEnv, sink: &MemorySink) -> (Arc<RecordingEngine>, Logger<'static>) {
    let engine = Arc::new(RecordingEngine::default());
    let logger = Logger::builder()
        .engine(engine.clone())
        .env(env.clone())
        .raw_sink(sink.clone())
        .build()
        .expect("valid config");
    (engine, logger)
}

#[test]
fn test_records_carry_request_fields() {
    let env = MapEnv::new().with_var("SERVICE_NAME", "checkout");
    let (engine, base) = setup(&env, &MemorySink::new());

    let request = Request { id: "req-42" };
    let logger = base.with_context(&request);
    logger.info("order %d placed", &[1001.into()]);
    logger.warn("stock low", &[]);

    let records = engine.records();
    assert_eq!(records.len(), 2);

    let (level, message, fields) = &records[0];
    assert_eq!(*level, LogLevel::Info);
    assert_eq!(message, "order 1001 placed");
    assert_eq!(
        fields,
        &FieldSet::new()
            .with_field("x-request-id", "req-42")
            .with_field("service", "checkout")
    );
    assert_eq!(records[1].0, LogLevel::Warn);
}

#[test]
fn test_detached_logger_has_no_fields() {
    let env = MapEnv::new().with_var("SERVICE_NAME", "checkout");
    let (engine, logger) = setup(&env, &MemorySink::new());

    assert!(!logger.has_context());
    logger.error("boot failed", &[]);
    assert!(engine.records()[0].2.is_empty());
}

#[test]
fn test_bypass_skips_engine_for_every_level() {
    let env = MapEnv::new().with_var("QLOG_DEBUG", "true");
    let sink = MemorySink::new();
    let (engine, base) = setup(&env, &sink);
    let request = Request { id: "req-1" };
    let logger = base.with_context(&request);

    logger.debug("d %d", &[1.into()]);
    logger.info("i %s", &["x".into()]);
    logger.warn("w", &[]);
    logger.error("e %v", &[true.into()]);
    logger.fatal("f %d", &[9.into()]);

    assert!(engine.records().is_empty());
    assert_eq!(sink.lines(), vec!["d 1", "i x", "w", "e true", "f 9"]);
}

#[test]
fn test_bypass_toggle_read_each_call() {
    let env = MapEnv::new();
    let sink = MemorySink::new();
    let (engine, logger) = setup(&env, &sink);

    logger.info("structured", &[]);
    env.set("QLOG_DEBUG", "");
    logger.info("raw", &[]);
    env.remove("QLOG_DEBUG");
    logger.info("structured again", &[]);

    let messages: Vec<String> = engine.records().into_iter().map(|r| r.1).collect();
    assert_eq!(messages, vec!["structured", "structured again"]);
    assert_eq!(sink.lines(), vec!["raw"]);
}

#[test]
fn test_format_mismatch_still_delivered() {
    let (engine, logger) = setup(&MapEnv::new(), &MemorySink::new());

    logger.info("value %d", &["not-a-number".into()]);
    logger.info("%s and %s", &["one".into()]);
    logger.info("none", &[1.into()]);

    let records = engine.records();
    assert_eq!(records[0], (LogLevel::Info, "value %!d(string=not-a-number)".to_string(), FieldSet::new()));
    assert_eq!(records[1].1, "one and %!s(MISSING)");
    assert_eq!(records[2].1, "none%!(EXTRA int=1)");
}

#[test]
fn test_info_json_merges_document() {
    let env = MapEnv::new().with_var("SERVICE_NAME", "checkout");
    let (engine, base) = setup(&env, &MemorySink::new());
    let request = Request { id: "req-7" };
    let logger = base.with_context(&request);

    let Value::Object(meta) = json!({"a": 1}) else {
        unreachable!()
    };
    logger.info_json("order", r#"{"id":1}"#, LoggerExtras::new("meta", meta));

    let (level, message, fields) = engine.records().remove(0);
    assert_eq!(level, LogLevel::Info);
    assert_eq!(message, r#"order {"id":1}"#);
    assert_eq!(fields.get("meta").map(FieldValue::to_json_value), Some(json!({"a": 1})));
    let keys: Vec<&str> = fields.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["x-request-id", "service", "meta"]);
}

#[test]
fn test_info_json_malformed_document_dropped() {
    let (engine, logger) = setup(&MapEnv::new(), &MemorySink::new());

    let Value::Object(meta) = json!({"a": 1}) else {
        unreachable!()
    };
    logger.info_json("order", "{bad", LoggerExtras::new("meta", meta));

    let records = engine.records();
    assert_eq!(records, vec![(LogLevel::Info, "order".to_string(), FieldSet::new())]);
}

#[test]
fn test_info_json_extras_need_key_and_value() {
    let (engine, logger) = setup(&MapEnv::new(), &MemorySink::new());

    logger.info_json("a", "[]", LoggerExtras::default().with_filter(["ignored"]));
    logger.info_json("b", "1", LoggerExtras::new("", serde_json::Map::new()));

    for (_, _, fields) in engine.records() {
        assert!(fields.is_empty());
    }
}

#[test]
fn test_info_json_bypass_writes_message_only() {
    let env = MapEnv::new().with_var("QLOG_DEBUG", "1");
    let sink = MemorySink::new();
    let (engine, logger) = setup(&env, &sink);

    logger.info_json("order", r#"{"id":1}"#, LoggerExtras::default());

    assert!(engine.records().is_empty());
    assert_eq!(sink.lines(), vec!["order"]);
}

#[test]
fn test_debug_enabled_and_sync() {
    let (engine, logger) = setup(&MapEnv::new(), &MemorySink::new());
    assert!(logger.debug_enabled());
    logger.sync().expect("flush succeeds");
    assert_eq!(engine.flushes.load(Ordering::SeqCst), 1);

    let failing = Logger::builder()
        .engine(Arc::new(FailingFlush))
        .env(MapEnv::new())
        .build()
        .expect("valid config");
    assert!(!failing.debug_enabled());
    let err = failing.sync().unwrap_err();
    assert!(err.to_string().contains("connection reset"));
}

#[test]
fn test_fatal_runs_hook_after_write() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("fatal.log");

    let exits = Arc::new(AtomicUsize::new(0));
    let hook_exits = Arc::clone(&exits);
    let engine = Engine::builder()
        .appender(FileAppender::new(&log_file).expect("Failed to create appender"))
        .on_fatal(Arc::new(move |_: &str| {
            hook_exits.fetch_add(1, Ordering::SeqCst);
        }))
        .build();
    let logger = Logger::builder()
        .engine(Arc::new(engine))
        .env(MapEnv::new())
        .build()
        .expect("valid config");

    logger.fatal("disk %s", &["full".into()]);

    assert_eq!(exits.load(Ordering::SeqCst), 1);
    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    assert!(content.contains("[FATAL]"));
    assert!(content.contains("disk full"));
}

#[test]
#[should_panic(expected = "invariant broken")]
fn test_panic_level_panics() {
    let logger = Logger::builder()
        .engine(Arc::new(Engine::new()))
        .env(MapEnv::new())
        .build()
        .expect("valid config");
    logger.panic("invariant %s", &["broken".into()]);
}

#[test]
fn test_dpanic_panics_only_in_development() {
    let production = Logger::builder()
        .engine(Arc::new(Engine::new()))
        .env(MapEnv::new())
        .build()
        .expect("valid config");
    production.dpanic("tolerated", &[]);

    let development = Logger::builder()
        .engine(Arc::new(Engine::builder().development(true).build()))
        .env(MapEnv::new())
        .build()
        .expect("valid config");
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        development.dpanic("not tolerated", &[]);
    }));
    assert!(result.is_err());
}

#[test]
fn test_file_output_json_lines() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("app.jsonl");

    let engine = Engine::builder()
        .min_level(LogLevel::Info)
        .appender(FileAppender::json(&log_file).expect("Failed to create appender"))
        .build();
    let env = MapEnv::new().with_var("SERVICE_NAME", "checkout");
    let base = Logger::builder()
        .engine(Arc::new(engine))
        .env(env)
        .build()
        .expect("valid config");

    let request = Request { id: "req-5" };
    let logger = base.with_context(&request);
    logger.debug("filtered out", &[]);
    logger.info("User logged in\nERROR fake line", &[]);
    logger
        .record(LogLevel::Warn)
        .message("slow query %dms")
        .arg(250)
        .field("table", "orders")
        .emit();
    logger.sync().expect("Failed to flush");

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).expect("line is JSON"))
        .collect();
    assert_eq!(lines.len(), 2);

    assert_eq!(lines[0]["level"], "INFO");
    assert_eq!(lines[0]["message"], "User logged in\\nERROR fake line");
    assert_eq!(lines[0]["x-request-id"], "req-5");
    assert_eq!(lines[0]["service"], "checkout");

    assert_eq!(lines[1]["level"], "WARN");
    assert_eq!(lines[1]["message"], "slow query 250ms");
    assert_eq!(lines[1]["table"], "orders");
}

#[test]
fn test_async_engine_delivers_records() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("async.log");

    let engine = Engine::builder()
        .async_mode(100)
        .min_level(LogLevel::Debug)
        .appender(FileAppender::new(&log_file).expect("Failed to create appender"))
        .build();
    assert!(engine.is_async());

    let engine = Arc::new(engine);
    let logger = Logger::builder()
        .engine(engine.clone())
        .env(MapEnv::new())
        .build()
        .expect("valid config");

    for i in 0..10 {
        logger.debug("message %d", &[i.into()]);
    }
    logger.sync().expect("Failed to flush");

    // Everything is on disk before the engine shuts down
    assert_eq!(engine.metrics().written(), 10);
    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 10);
    for (i, line) in lines.iter().enumerate() {
        assert!(line.contains(&format!("message {}", i)));
    }
}

#[test]
fn test_async_fatal_keeps_earlier_records() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("async_fatal.log");

    let written_at_exit = Arc::new(AtomicUsize::new(usize::MAX));
    let hook: FatalHook = {
        let path = log_file.clone();
        let written_at_exit = Arc::clone(&written_at_exit);
        Arc::new(move |_: &str| {
            let content = fs::read_to_string(&path).unwrap_or_default();
            written_at_exit.store(content.lines().count(), Ordering::SeqCst);
        })
    };
    let engine = Engine::builder()
        .async_mode(100)
        .appender(FileAppender::new(&log_file).expect("Failed to create appender"))
        .on_fatal(hook)
        .build();
    let logger = Logger::builder()
        .engine(Arc::new(engine))
        .env(MapEnv::new())
        .build()
        .expect("valid config");

    for i in 0..5 {
        logger.info("step %d", &[i.into()]);
    }
    logger.fatal("dying", &[]);

    assert_eq!(written_at_exit.load(Ordering::SeqCst), 6);
    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let last = content.lines().last().expect("records written");
    assert!(last.contains("dying"));
    assert!(content.lines().next().is_some_and(|l| l.contains("step 0")));
}

#[test]
fn test_production_preset_builds() {
    let request = Request { id: "req-1" };
    let logger = Logger::production(&request);
    assert!(logger.has_context());
    assert!(!logger.debug_enabled());
}
