//! Output format configuration for log entries
//!
//! Provides different output formats for log entries:
//! - Text: Human-readable format (default)
//! - Json: Machine-readable JSON format, one object per line
//! - Logfmt: Key-value format compatible with log aggregation tools

use super::field_set::FieldValue;
use super::log_entry::LogEntry;
use super::timestamp::TimestampFormat;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

/// Key under which the message is written in structured formats
pub const MESSAGE_KEY: &str = "message";

/// Output format for log entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format (default)
    ///
    /// Example: `[2025-01-08T10:30:45.000Z] [INFO ] main - Request processed x-request-id=abc`
    #[default]
    Text,

    /// JSON format for machine processing
    ///
    /// Example: `{"timestamp":"2025-01-08T10:30:45.000Z","level":"INFO","message":"Request processed","x-request-id":"abc"}`
    Json,

    /// Logfmt format (key=value pairs)
    ///
    /// Example: `timestamp=2025-01-08T10:30:45.000Z level=INFO message="Request processed" x-request-id="abc"`
    Logfmt,
}

impl OutputFormat {
    /// Format a log entry according to this output format
    pub fn format(&self, entry: &LogEntry, timestamp_format: &TimestampFormat) -> String {
        match self {
            OutputFormat::Text => self.format_text(entry, timestamp_format),
            OutputFormat::Json => self.format_json(entry, timestamp_format),
            OutputFormat::Logfmt => self.format_logfmt(entry, timestamp_format),
        }
    }

    /// Format as human-readable text
    fn format_text(&self, entry: &LogEntry, timestamp_format: &TimestampFormat) -> String {
        let base = format!(
            "[{}] [{:5}] {} - {}",
            timestamp_format.format(&entry.timestamp),
            entry.level.to_str(),
            entry.thread_label(),
            entry.message
        );

        if entry.fields.is_empty() {
            base
        } else {
            format!("{} {}", base, entry.fields.format_fields())
        }
    }

    /// Format as JSON
    ///
    /// Fields follow the fixed keys in insertion order. Duplicate field keys
    /// are written twice rather than collapsed.
    fn format_json(&self, entry: &LogEntry, timestamp_format: &TimestampFormat) -> String {
        let record = JsonRecord {
            entry,
            timestamp_format,
        };
        serde_json::to_string(&record).unwrap_or_else(|e| {
            eprintln!("[LOGGER ERROR] Failed to encode record as JSON: {}", e);
            String::new()
        })
    }

    /// Format as logfmt (key=value pairs)
    fn format_logfmt(&self, entry: &LogEntry, timestamp_format: &TimestampFormat) -> String {
        let mut parts = vec![
            format!(
                "timestamp={}",
                escape_logfmt_value(&timestamp_format.format(&entry.timestamp))
            ),
            format!("level={}", entry.level.to_str()),
            format!("{}={}", MESSAGE_KEY, quote_logfmt_value(&entry.message)),
            format!("thread={}", escape_logfmt_value(entry.thread_label())),
        ];

        for (key, value) in entry.fields.iter() {
            let formatted_value = match value {
                FieldValue::String(s) => quote_logfmt_value(s),
                FieldValue::Json(v) => quote_logfmt_value(&v.to_string()),
                other => other.to_string(),
            };
            parts.push(format!("{}={}", escape_logfmt_key(key), formatted_value));
        }

        parts.join(" ")
    }
}

struct JsonRecord<'a> {
    entry: &'a LogEntry,
    timestamp_format: &'a TimestampFormat,
}

impl Serialize for JsonRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entry = self.entry;
        let mut map = serializer.serialize_map(Some(4 + entry.fields.len()))?;

        if self.timestamp_format.is_numeric() {
            map.serialize_entry("timestamp", &entry.timestamp.timestamp_millis())?;
        } else {
            map.serialize_entry("timestamp", &self.timestamp_format.format(&entry.timestamp))?;
        }
        map.serialize_entry("level", entry.level.to_str())?;
        map.serialize_entry(MESSAGE_KEY, &entry.message)?;
        map.serialize_entry("thread", entry.thread_label())?;

        for (key, value) in entry.fields.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Escape a logfmt key (remove spaces and special chars)
fn escape_logfmt_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Escape a logfmt value (quote if contains spaces)
fn escape_logfmt_value(value: &str) -> String {
    if value.contains(' ') || value.contains('"') || value.contains('=') {
        quote_logfmt_value(value)
    } else {
        value.to_string()
    }
}

/// Quote a logfmt value
fn quote_logfmt_value(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
