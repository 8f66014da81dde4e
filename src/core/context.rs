//! Request-context capabilities
//!
//! A logger carries one opaque request context. Rather than knowing concrete
//! web-framework types, the extraction pipeline probes the context for a small
//! set of capabilities. Each capability is a separate trait, and a context type
//! advertises the ones it supports by overriding the matching accessor on
//! [`LoggingContext`]. Every accessor defaults to "not supported", so probing
//! a context for the wrong shape is always safe.
//!
//! # Example
//!
//! ```
//! use qlog::core::context::{LoggingContext, RequestValues};
//! use std::collections::HashMap;
//!
//! struct RouterContext {
//!     keys: HashMap<String, String>,
//! }
//!
//! impl RequestValues for RouterContext {
//!     fn get_string(&self, key: &str) -> Option<&str> {
//!         self.keys.get(key).map(String::as_str)
//!     }
//! }
//!
//! impl LoggingContext for RouterContext {
//!     fn request_values(&self) -> Option<&dyn RequestValues> {
//!         Some(self)
//!     }
//! }
//! ```

use std::any::Any;

/// Keyed string store exposed by router-style request contexts
pub trait RequestValues {
    /// String stored under `key`, if any
    fn get_string(&self, key: &str) -> Option<&str>;
}

/// Per-request user value store, as found on low-level HTTP server contexts
///
/// Values are untyped; only entries whose concrete type is a string are used
/// for field extraction.
pub trait UserValues {
    fn user_value(&self, key: &str) -> Option<&(dyn Any + Send + Sync)>;
}

/// An opaque, caller-owned request context
///
/// Implementors are read-only from the logger's point of view and must be
/// shareable across threads.
pub trait LoggingContext: Send + Sync {
    /// Router-style keyed store
    fn request_values(&self) -> Option<&dyn RequestValues> {
        None
    }

    /// Whether this context is a plain HTTP request
    fn is_http_request(&self) -> bool {
        false
    }

    /// Low-level per-request value store
    fn user_values(&self) -> Option<&dyn UserValues> {
        None
    }
}

/// The unit context matches no shape
impl LoggingContext for () {}

impl<T: LoggingContext + ?Sized> LoggingContext for &T {
    fn request_values(&self) -> Option<&dyn RequestValues> {
        (**self).request_values()
    }

    fn is_http_request(&self) -> bool {
        (**self).is_http_request()
    }

    fn user_values(&self) -> Option<&dyn UserValues> {
        (**self).user_values()
    }
}

impl<T: LoggingContext + ?Sized> LoggingContext for Box<T> {
    fn request_values(&self) -> Option<&dyn RequestValues> {
        (**self).request_values()
    }

    fn is_http_request(&self) -> bool {
        (**self).is_http_request()
    }

    fn user_values(&self) -> Option<&dyn UserValues> {
        (**self).user_values()
    }
}

impl<T: LoggingContext + ?Sized> LoggingContext for std::sync::Arc<T> {
    fn request_values(&self) -> Option<&dyn RequestValues> {
        (**self).request_values()
    }

    fn is_http_request(&self) -> bool {
        (**self).is_http_request()
    }

    fn user_values(&self) -> Option<&dyn UserValues> {
        (**self).user_values()
    }
}

/// Borrow a string out of an untyped user value
pub fn user_value_str(value: &(dyn Any + Send + Sync)) -> Option<&str> {
    value
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| value.downcast_ref::<&'static str>().copied())
}
