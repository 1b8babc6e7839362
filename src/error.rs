//! Error types for livemon.
//!
//! All errors in livemon are strongly typed using thiserror.
//! Runtime access failures are isolated per handle; resolution and scan
//! failures degrade to fallbacks and are only surfaced through logs, so the
//! top-level [`MonitorError`] mostly reaches callers of the context API.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading, writing or invoking a monitored member.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("instance member '{member}' was accessed without a target")]
    MissingTarget {
        member: String,
    },

    #[error("target does not expose '{expected}' required by member '{member}'")]
    TargetMismatch {
        member: String,
        expected: String,
    },

    #[error("member '{member}' is not readable")]
    NotReadable {
        member: String,
    },

    #[error("member '{member}' is not writable")]
    NotWritable {
        member: String,
    },

    #[error("member '{member}' expects {expected}, got {actual}")]
    TypeMismatch {
        member: String,
        expected: String,
        actual: String,
    },

    #[error("method '{member}' expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        member: String,
        expected: usize,
        actual: usize,
    },

    #[error("accessor panicked: {message}")]
    Panicked {
        message: String,
    },

    #[error("{message}")]
    Failed {
        message: String,
    },

    #[error("handle {id} is disposed")]
    Disposed {
        id: u64,
    },
}

impl AccessError {
    /// Creates a generic accessor failure, the equivalent of a thrown exception.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Failures resolving an optional hook named by an attribute.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("member '{member}' not found on '{type_name}' or its supertypes")]
    MemberNotFound {
        type_name: String,
        member: String,
    },

    #[error("member '{type_name}.{member}' has an invalid signature: expected {expected}")]
    InvalidSignature {
        type_name: String,
        member: String,
        expected: String,
    },

    #[error("condition {condition} cannot be applied to values of type {value_type}")]
    ConditionNotApplicable {
        condition: String,
        value_type: String,
    },

    #[error("values of type {value_type} have no ordering for {comparison}")]
    NotOrderable {
        comparison: String,
        value_type: String,
    },

    #[error("comparison operand {operand} is incompatible with {value_type}")]
    IncompatibleOperand {
        operand: String,
        value_type: String,
    },

    #[error("invalid number format '{format}': {reason}")]
    InvalidFormat {
        format: String,
        reason: String,
    },
}

/// Failures during the startup scan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("failed to load type '{type_name}' from '{assembly}': {reason}")]
    TypeLoad {
        assembly: String,
        type_name: String,
        reason: String,
    },

    #[error("member '{type_name}.{member}' is not eligible: {reason}")]
    Ineligible {
        type_name: String,
        member: String,
        reason: String,
    },

    #[error("scan was cancelled")]
    Cancelled,
}

/// Settings loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {message}")]
    Parse {
        message: String,
    },

    #[error("invalid format for '{key}': {source}")]
    InvalidFormat {
        key: String,
        #[source]
        source: ResolveError,
    },

    #[error("invalid assembly filter '{pattern}': {reason}")]
    InvalidFilter {
        pattern: String,
        reason: String,
    },
}

/// Top-level error type for livemon.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid state: {message}")]
    State {
        message: String,
    },
}

impl MonitorError {
    /// Creates an invalid-state error.
    #[must_use]
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Returns true if this is a runtime access error.
    #[must_use]
    pub const fn is_access(&self) -> bool {
        matches!(self, Self::Access(_))
    }

    /// Returns true if this is a scan error.
    #[must_use]
    pub const fn is_scan(&self) -> bool {
        matches!(self, Self::Scan(_))
    }

    /// Returns true if the startup scan was cancelled rather than failed.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Scan(ScanError::Cancelled))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias for livemon operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
