//! # Error Handling
//!
//! Hierarchical error type for the document lens, with per-error context and
//! classification traits.
//!
//! ## Error Classification
//!
//! - **Acquisition**: camera permission or device failures (`CameraAcquisition`)
//! - **Identity/session**: invalid client id or unreachable validation service
//!   (`Auth`, `Network`)
//! - **Engine**: a vision engine call failed after it was admitted (`Engine`)
//! - **Transport stall**: the crop socket failed or stopped answering
//!   (`Transport`, `Timeout`)
//! - **Invariant violations**: rejected arguments (`Validation`)
//!
//! "Engine not ready" is not an error: the engine facade reports it through
//! [`crate::engine::EngineOutcome::NotReady`].
//!
//! ## Usage
//!
//! ```rust
//! use doc_lens::error::{LensError, Retryable};
//!
//! let error = LensError::timeout("socket_crop", 5000)
//!     .with_context("waiting for cropped contours")
//!     .with_recovery_suggestion("Restart the capture session");
//!
//! assert!(error.is_retryable());
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Debug-level errors that don't affect operation
    Debug,
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that affect operation but can be recovered from
    Error,
    /// Fatal errors that end the capture session
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Whether this error is retryable
    pub retryable: bool,
    /// Additional metadata as key-value pairs
    pub metadata: std::collections::HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            retryable: false,
            metadata: std::collections::HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }
}

/// Base error type for the document lens
#[derive(Debug)]
pub enum LensError {
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Camera stream could not be acquired
    CameraAcquisition {
        reason: String,
        context: ErrorContext,
    },
    /// Vision engine call failed
    Engine {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// Crop socket failures
    Transport {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// Timeout errors (stalled transport, missing connect event)
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },
    /// Argument invariant violations
    Validation {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
    /// Operation not valid in the current coordinator state
    State {
        current_state: String,
        attempted_operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// Network errors
    Network {
        operation: String,
        address: Option<String>,
        source: Option<Box<dyn StdError + Send + Sync>>,
        context: ErrorContext,
    },
    /// Client id rejected by the validation service
    Auth {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// Image or message encoding/decoding failures
    Codec {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
}

impl LensError {
    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a camera acquisition error
    pub fn camera(reason: impl Into<String>) -> Self {
        Self::CameraAcquisition {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an engine error
    pub fn engine(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Engine {
            operation: operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a transport error
    pub fn transport(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
            context: ErrorContext::new(),
        }
    }

    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a state error
    pub fn state(
        current_state: impl Into<String>,
        attempted_operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a network error
    pub fn network(operation: impl Into<String>) -> Self {
        Self::Network {
            operation: operation.into(),
            address: None,
            source: None,
            context: ErrorContext::new(),
        }
    }

    /// Create an authentication error
    pub fn auth(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Auth {
            operation: operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a codec error
    pub fn codec(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Codec {
            operation: operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Attach the address a network error relates to
    pub fn with_address(mut self, addr: impl Into<String>) -> Self {
        if let Self::Network { address, .. } = &mut self {
            *address = Some(addr.into());
        }
        self
    }

    /// Attach the underlying cause of a network error
    pub fn with_source(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        if let Self::Network { source, .. } = &mut self {
            *source = Some(Box::new(cause));
        }
        self
    }

    /// Add context to this error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Set the operation that was being performed
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Set recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Set severity level
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Mark as retryable
    pub fn retryable(mut self) -> Self {
        self.context_mut().retryable = true;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. }
            | Self::CameraAcquisition { context, .. }
            | Self::Engine { context, .. }
            | Self::Transport { context, .. }
            | Self::Timeout { context, .. }
            | Self::Validation { context, .. }
            | Self::State { context, .. }
            | Self::Network { context, .. }
            | Self::Auth { context, .. }
            | Self::Codec { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. }
            | Self::CameraAcquisition { context, .. }
            | Self::Engine { context, .. }
            | Self::Transport { context, .. }
            | Self::Timeout { context, .. }
            | Self::Validation { context, .. }
            | Self::State { context, .. }
            | Self::Network { context, .. }
            | Self::Auth { context, .. }
            | Self::Codec { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::CameraAcquisition { .. } => "camera_acquisition",
            Self::Engine { .. } => "engine",
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Validation { .. } => "validation",
            Self::State { .. } => "state",
            Self::Network { .. } => "network",
            Self::Auth { .. } => "auth",
            Self::Codec { .. } => "codec",
        }
    }
}

impl fmt::Display for LensError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LensError::Config {
                field,
                value,
                reason,
                ..
            } => write!(
                f,
                "Configuration error in '{}': {} (value: {})",
                field, reason, value
            ),
            LensError::CameraAcquisition { reason, .. } => {
                write!(f, "Camera stream could not be acquired: {}", reason)
            }
            LensError::Engine { operation, reason, .. } => {
                write!(f, "Vision engine error in '{}': {}", operation, reason)
            }
            LensError::Transport { operation, reason, .. } => {
                write!(f, "Crop socket error in '{}': {}", operation, reason)
            }
            LensError::Timeout {
                operation,
                duration_ms,
                ..
            } => write!(
                f,
                "Operation '{}' timed out after {}ms",
                operation, duration_ms
            ),
            LensError::Validation {
                field,
                constraint,
                value,
                ..
            } => write!(
                f,
                "Validation error in '{}': {} (value: {})",
                field, constraint, value
            ),
            LensError::State {
                current_state,
                attempted_operation,
                reason,
                ..
            } => write!(
                f,
                "Cannot {} while {}: {}",
                attempted_operation, current_state, reason
            ),
            LensError::Network {
                operation,
                address,
                source,
                ..
            } => {
                write!(f, "Network error in '{}'", operation)?;
                if let Some(addr) = address {
                    write!(f, " ({})", addr)?;
                }
                if let Some(src) = source {
                    write!(f, ": {}", src)?;
                }
                Ok(())
            }
            LensError::Auth { operation, reason, .. } => {
                write!(f, "Authentication error in '{}': {}", operation, reason)
            }
            LensError::Codec { operation, reason, .. } => {
                write!(f, "Codec error in '{}': {}", operation, reason)
            }
        }
    }
}

impl StdError for LensError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            LensError::Network {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type LensResult<T> = Result<T, LensError>;

/// Trait for errors that can be retried
pub trait Retryable {
    /// Check if this error can be retried
    fn is_retryable(&self) -> bool;

    /// Get the recommended retry delay in milliseconds
    fn retry_delay_ms(&self) -> Option<u64> {
        None
    }
}

impl Retryable for LensError {
    fn is_retryable(&self) -> bool {
        self.context().retryable
            || matches!(
                self,
                Self::Timeout { .. } | Self::Network { .. } | Self::Transport { .. }
            )
    }

    fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            Self::Timeout { .. } => Some(1000),
            Self::Network { .. } => Some(2000),
            Self::Transport { .. } => Some(500),
            _ => None,
        }
    }
}

/// Trait for errors that expose a severity
pub trait HasSeverity {
    /// Get the error severity
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for LensError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Auth { .. } | Self::CameraAcquisition { .. } => ErrorSeverity::Fatal,
            _ => self.context().severity,
        }
    }
}

/// Trait for errors that carry a recovery suggestion
pub trait HasRecoverySuggestion {
    /// Get a human readable recovery suggestion, if any
    fn recovery_suggestion(&self) -> Option<String>;
}

impl HasRecoverySuggestion for LensError {
    fn recovery_suggestion(&self) -> Option<String> {
        if let Some(s) = &self.context().recovery_suggestion {
            return Some(s.clone());
        }
        match self {
            Self::CameraAcquisition { .. } => {
                Some("Grant camera permission and re-run the initializer".into())
            }
            Self::Auth { .. } => Some("Check the CLIENT-ID issued for this partner".into()),
            Self::Timeout { .. } | Self::Transport { .. } => {
                Some("Stop and re-initialize the capture session".into())
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for LensError {
    fn from(err: serde_json::Error) -> Self {
        Self::codec("json", err.to_string())
    }
}

impl From<image::ImageError> for LensError {
    fn from(err: image::ImageError) -> Self {
        Self::codec("image", err.to_string())
    }
}

impl From<base64::DecodeError> for LensError {
    fn from(err: base64::DecodeError) -> Self {
        Self::codec("base64", err.to_string())
    }
}

impl From<lens_scale::cpu::ScaleError> for LensError {
    fn from(err: lens_scale::cpu::ScaleError) -> Self {
        Self::codec("scale", err.to_string())
    }
}

impl From<reqwest::Error> for LensError {
    fn from(err: reqwest::Error) -> Self {
        let address = err.url().map(|u| u.to_string());
        let mut e = Self::network("http").with_source(err);
        if let Some(addr) = address {
            e = e.with_address(addr);
        }
        e
    }
}
