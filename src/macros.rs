//! Logging macros with printf-style arguments.
//!
//! Each argument is converted with [`FormatArg::from`](crate::FormatArg), so
//! any integer, float, `bool`, `char`, string or `serde_json::Value` can be
//! passed directly.
//!
//! # Examples
//!
//! ```
//! use qlog::prelude::*;
//! use qlog::info;
//! use std::sync::Arc;
//!
//! let logger = Logger::builder().engine(Arc::new(Engine::new())).build().unwrap();
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port %d", port);
//!
//! // Mixed argument types
//! info!(logger, "User %d performed %q in %.2fs", 42, "login", 0.25);
//! ```

/// Log at an explicit level.
///
/// # Examples
///
/// ```
/// # use qlog::prelude::*;
/// # let logger = Logger::builder().engine(std::sync::Arc::new(Engine::new())).build().unwrap();
/// use qlog::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: %d", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        $logger.log($level, $fmt, &[$($crate::FormatArg::from($arg)),*])
    };
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// # use qlog::prelude::*;
/// # let logger = Logger::builder().engine(std::sync::Arc::new(Engine::new())).build().unwrap();
/// use qlog::debug;
/// debug!(logger, "Debug information");
/// debug!(logger, "Counter value: %d", 10);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use qlog::prelude::*;
/// # let logger = Logger::builder().engine(std::sync::Arc::new(Engine::new())).build().unwrap();
/// use qlog::error;
/// let err = "connection refused";
/// error!(logger, "Failed to connect: %s", err);
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal message; the engine ends the process afterwards.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}
