//! Debug bypass
//!
//! When the bypass variable is present in the environment, log calls skip the
//! structured engine and write the formatted message as a raw line. The
//! variable is checked on every call, so it can be flipped at runtime.

use super::env::{EnvSource, ProcessEnv};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Default variable that enables the bypass
pub const DEFAULT_BYPASS_VAR: &str = "QLOG_DEBUG";

/// Unbuffered line output used while the bypass is active
pub trait RawSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes raw lines to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl RawSink for StderrSink {
    fn write_line(&self, line: &str) {
        let mut stderr = std::io::stderr().lock();
        // Nowhere left to report a failed raw write.
        let _ = writeln!(stderr, "{}", line);
    }
}

/// Collects raw lines in memory
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl RawSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Decides per call whether emission bypasses the structured engine
#[derive(Clone)]
pub struct LevelGate {
    env: Arc<dyn EnvSource>,
    bypass_var: String,
    sink: Arc<dyn RawSink>,
}

impl LevelGate {
    pub fn new(env: Arc<dyn EnvSource>, bypass_var: impl Into<String>, sink: Arc<dyn RawSink>) -> Self {
        Self {
            env,
            bypass_var: bypass_var.into(),
            sink,
        }
    }

    /// Gate reading `QLOG_DEBUG` from the process environment and writing to stderr
    pub fn from_process() -> Self {
        Self::new(Arc::new(ProcessEnv), DEFAULT_BYPASS_VAR, Arc::new(StderrSink))
    }

    pub fn bypass_var(&self) -> &str {
        &self.bypass_var
    }

    /// True while the bypass variable is set, whatever its value
    pub fn should_bypass(&self) -> bool {
        self.env.is_set(&self.bypass_var)
    }

    /// Write a line straight to the raw sink
    pub fn write_raw(&self, line: &str) {
        self.sink.write_line(line);
    }
}

impl std::fmt::Debug for LevelGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelGate")
            .field("bypass_var", &self.bypass_var)
            .finish_non_exhaustive()
    }
}
