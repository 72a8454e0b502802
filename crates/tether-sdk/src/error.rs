//! Errors raised by native member bodies

/// Result type returned by native member bodies.
pub type NativeResult<T> = Result<T, NativeError>;

/// Native-side error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NativeError {
    /// The native member failed with a message
    #[error("{0}")]
    Failure(String),

    /// Invalid argument handed to a native member
    #[error("Argument error: {0}")]
    Argument(String),

    /// Type mismatch during conversion
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Member body panicked
    #[error("Function panicked: {0}")]
    Panic(String),

    /// A deferred completion was dropped without a result
    #[error("Completion was dropped without a result")]
    Dropped,
}

impl NativeError {
    /// Create a failure with a message
    pub fn failure(message: impl Into<String>) -> Self {
        NativeError::Failure(message.into())
    }

    /// Create an argument error with a message
    pub fn argument(message: impl Into<String>) -> Self {
        NativeError::Argument(message.into())
    }

    pub(crate) fn mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        NativeError::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

impl From<String> for NativeError {
    fn from(message: String) -> Self {
        NativeError::Failure(message)
    }
}

impl From<&str> for NativeError {
    fn from(message: &str) -> Self {
        NativeError::Failure(message.to_string())
    }
}
