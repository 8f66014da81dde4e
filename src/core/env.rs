//! Process configuration reads
//!
//! Environment variables are read through an [`EnvSource`] so the logger never
//! touches process globals directly. [`ProcessEnv`] reads the real environment;
//! [`MapEnv`] is an in-memory source for tests and embedded configuration.
//! Values are looked up on every call and never cached.

use super::field_set::FieldSet;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Field key for the service name
pub const KEY_SERVICE: &str = "service";

/// Default variable holding the service name
pub const DEFAULT_SERVICE_VAR: &str = "SERVICE_NAME";

/// Read access to process configuration
pub trait EnvSource: Send + Sync {
    /// Value of `name`, or `None` when the variable is not set
    ///
    /// A variable set to the empty string is present and yields `Some("")`.
    fn var(&self, name: &str) -> Option<String>;

    fn is_set(&self, name: &str) -> bool {
        self.var(name).is_some()
    }
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var_os(name).map(|v| v.to_string_lossy().into_owned())
    }
}

/// In-memory environment
///
/// Cloning shares the underlying map, so a test can hold one handle and flip
/// variables while a logger reads through another.
///
/// # Example
///
/// ```
/// use qlog::core::env::{EnvSource, MapEnv};
///
/// let env = MapEnv::new().with_var("SERVICE_NAME", "billing");
/// assert_eq!(env.var("SERVICE_NAME").as_deref(), Some("billing"));
///
/// env.remove("SERVICE_NAME");
/// assert!(!env.is_set("SERVICE_NAME"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: Arc<RwLock<HashMap<String, String>>>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_var(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.write().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) {
        self.vars.write().remove(name);
    }

    pub fn clear(&self) {
        self.vars.write().clear();
    }
}

impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.read().get(name).cloned()
    }
}

/// Appends process-wide fields to every record
///
/// Currently this is the `service` field, taken from the configured service
/// variable. Each call to [`enrich`](Self::enrich) appends again, so a
/// pipeline must enrich a field set at most once.
#[derive(Clone)]
pub struct EnvironmentEnricher {
    env: Arc<dyn EnvSource>,
    service_var: String,
}

impl EnvironmentEnricher {
    pub fn new(env: Arc<dyn EnvSource>, service_var: impl Into<String>) -> Self {
        Self {
            env,
            service_var: service_var.into(),
        }
    }

    /// Enricher reading `SERVICE_NAME` from the process environment
    pub fn from_process() -> Self {
        Self::new(Arc::new(ProcessEnv), DEFAULT_SERVICE_VAR)
    }

    pub fn service_var(&self) -> &str {
        &self.service_var
    }

    /// Append `service` when the service variable is set
    #[must_use]
    pub fn enrich(&self, mut fields: FieldSet) -> FieldSet {
        self.enrich_in_place(&mut fields);
        fields
    }

    pub fn enrich_in_place(&self, fields: &mut FieldSet) {
        if let Some(service) = self.env.var(&self.service_var) {
            fields.push(KEY_SERVICE, service);
        }
    }
}

impl std::fmt::Debug for EnvironmentEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentEnricher")
            .field("service_var", &self.service_var)
            .finish_non_exhaustive()
    }
}
