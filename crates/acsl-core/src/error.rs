//! Error types
//!
//! A single error enum shared by gains construction, control-law evaluation
//! and state bookkeeping.

use thiserror::Error;

/// Flight control errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    /// Malformed gains, failed Lyapunov solve, unknown controller type
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Euler-rate Jacobian is not invertible at this attitude
    #[error("Singular attitude: Euler-rate Jacobian not invertible at pitch = {pitch} rad")]
    SingularAttitude { pitch: f64 },
    /// Commanded total thrust too small to define an attitude reference
    #[error("Degenerate thrust: commanded total thrust {thrust} N cannot define an attitude")]
    DegenerateThrust { thrust: f64 },
    /// Vector or matrix dimensions disagree with what the operation expects
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },
}

impl ControlError {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ControlError::Configuration(msg.into())
    }

    /// Shorthand for a shape mismatch
    pub fn shape(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        ControlError::ShapeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Whether the caller may keep stepping after this error.
    ///
    /// A singular attitude depends on the measured state and can clear on a
    /// later step; configuration and shape errors cannot.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ControlError::SingularAttitude { .. })
    }
}

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, ControlError>;
