//! `Info` records carrying a caller-supplied JSON document

use super::{field_set::FieldValue, logger::Logger, log_level::LogLevel};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Extra structured data attached by [`Logger::info_json`]
///
/// `value` is attached under `key` only when both are non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerExtras {
    pub key: String,
    pub value: Map<String, Value>,
    /// Reserved for field filtering; currently ignored
    pub filter: Vec<String>,
}

impl LoggerExtras {
    pub fn new(key: impl Into<String>, value: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            value,
            filter: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_filter<I, S>(mut self, filter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter = filter.into_iter().map(Into::into).collect();
        self
    }

    fn is_attachable(&self) -> bool {
        !self.key.is_empty() && !self.value.is_empty()
    }
}

/// Whether `text` is exactly one well-formed JSON value
///
/// Surrounding whitespace is allowed; empty input is not.
///
/// ```
/// use qlog::is_valid_json;
///
/// assert!(is_valid_json(r#" {"a": [1, 2]} "#));
/// assert!(!is_valid_json("{\"a\": "));
/// assert!(!is_valid_json(""));
/// ```
pub fn is_valid_json(text: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok()
}

impl Logger<'_> {
    /// Emit an `Info` record with a raw JSON document appended to the message
    ///
    /// When `json` is well formed the record's message is `message`, a space
    /// and `json` verbatim, and `extras.value` is attached under
    /// `extras.key`. Malformed `json` is dropped with a warning on stderr and
    /// `message` is emitted alone with the context fields. The caller never
    /// sees an error.
    pub fn info_json(&self, message: &str, json: &str, extras: LoggerExtras) {
        if self.try_bypass(|| message.to_string()) {
            return;
        }

        let mut fields = self.context_fields();
        if !is_valid_json(json) {
            eprintln!(
                "[LOGGER WARNING] Discarding malformed JSON fragment ({} bytes) for message {:?}",
                json.len(),
                message
            );
            self.emit_fields(LogLevel::Info, message, fields);
            return;
        }

        if extras.is_attachable() {
            fields.push(extras.key, FieldValue::Json(Value::Object(extras.value)));
        }
        self.emit_fields(LogLevel::Info, &format!("{} {}", message, json), fields);
    }
}
