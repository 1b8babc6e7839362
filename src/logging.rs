//! Severity-configurable logging on top of `tracing`.
//!
//! Every failure kind has its own [`LogSeverity`] in the settings, so a
//! production build can silence resolution noise while still reporting
//! runtime access failures.

use serde::{Deserialize, Serialize};

/// Severity a failure kind is reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    /// Not reported.
    None,
    /// `info` level.
    Message,
    /// `warn` level.
    #[default]
    Warning,
    /// `error` level.
    Error,
    /// `error` level, flagged as an exception with the error attached.
    Exception,
}

impl LogSeverity {
    #[must_use]
    pub const fn is_silent(self) -> bool {
        matches!(self, Self::None)
    }
}

/// Logs through `tracing` at a runtime-selected [`LogSeverity`].
macro_rules! log_at {
    ($severity:expr, $($arg:tt)+) => {
        match $severity {
            $crate::logging::LogSeverity::None => {}
            $crate::logging::LogSeverity::Message => tracing::info!($($arg)+),
            $crate::logging::LogSeverity::Warning => tracing::warn!($($arg)+),
            $crate::logging::LogSeverity::Error => tracing::error!($($arg)+),
            $crate::logging::LogSeverity::Exception => tracing::error!(exception = true, $($arg)+),
        }
    };
}

pub(crate) use log_at;
