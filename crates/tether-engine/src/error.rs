//! Bridge error taxonomy
//!
//! Every failure surfaced to script code carries one of seven stable codes
//! and a human-readable message.

use serde_json::json;
use std::fmt;
use tether_sdk::NativeError;

use crate::config::ConfigError;
use crate::instances::InstanceNotFound;
use crate::marshal::MarshalError;
use crate::namespace::NamespaceError;
use crate::ScriptValue;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Stable error code reported to script code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Missing or malformed input
    InvalidArgument,
    /// Script type name not resolvable
    ClassNotFound,
    /// No member matches the name and script arity
    MemberNotFound,
    /// More than one member matches
    AmbiguousMember,
    /// Handle does not denote a live instance
    InstanceNotFound,
    /// Member is declared but reserved
    NotImplemented,
    /// Native code failed
    NativeFailure,
}

impl ErrorCode {
    /// Wire name of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "InvalidArgument",
            ErrorCode::ClassNotFound => "ClassNotFound",
            ErrorCode::MemberNotFound => "MemberNotFound",
            ErrorCode::AmbiguousMember => "AmbiguousMember",
            ErrorCode::InstanceNotFound => "InstanceNotFound",
            ErrorCode::NotImplemented => "NotImplemented",
            ErrorCode::NativeFailure => "NativeFailure",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bridge operation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// Missing or malformed input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Type not found
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// Member not found
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    /// Ambiguous member
    #[error("Ambiguous member: {0}")]
    AmbiguousMember(String),

    /// Instance not found
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// Reserved member invoked
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Native failure; the message is the native error's own text
    #[error("{0}")]
    NativeFailure(NativeError),
}

impl BridgeError {
    /// Stable code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            BridgeError::ClassNotFound(_) => ErrorCode::ClassNotFound,
            BridgeError::MemberNotFound(_) => ErrorCode::MemberNotFound,
            BridgeError::AmbiguousMember(_) => ErrorCode::AmbiguousMember,
            BridgeError::InstanceNotFound(_) => ErrorCode::InstanceNotFound,
            BridgeError::NotImplemented(_) => ErrorCode::NotImplemented,
            BridgeError::NativeFailure(_) => ErrorCode::NativeFailure,
        }
    }

    /// Message without the code prefix
    pub fn message(&self) -> String {
        match self {
            BridgeError::InvalidArgument(m)
            | BridgeError::ClassNotFound(m)
            | BridgeError::MemberNotFound(m)
            | BridgeError::AmbiguousMember(m)
            | BridgeError::InstanceNotFound(m)
            | BridgeError::NotImplemented(m) => m.clone(),
            BridgeError::NativeFailure(e) => e.to_string(),
        }
    }

    /// Error record delivered to script code: `{"code": ..., "message": ...}`
    pub fn to_script(&self) -> ScriptValue {
        json!({
            "code": self.code().as_str(),
            "message": self.message(),
        })
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        BridgeError::InvalidArgument(message.into())
    }
}

impl From<NativeError> for BridgeError {
    fn from(e: NativeError) -> Self {
        BridgeError::NativeFailure(e)
    }
}

impl From<NamespaceError> for BridgeError {
    fn from(e: NamespaceError) -> Self {
        match e {
            NamespaceError::UnknownNamespace(_) | NamespaceError::UnknownType(_) => {
                BridgeError::ClassNotFound(e.to_string())
            }
            NamespaceError::Conflict { .. }
            | NamespaceError::PrefixTaken { .. }
            | NamespaceError::Invalid(_) => BridgeError::InvalidArgument(e.to_string()),
        }
    }
}

impl From<InstanceNotFound> for BridgeError {
    fn from(e: InstanceNotFound) -> Self {
        BridgeError::InstanceNotFound(e.to_string())
    }
}

impl From<MarshalError> for BridgeError {
    fn from(e: MarshalError) -> Self {
        match e {
            MarshalError::InstanceNotFound(e) => e.into(),
            MarshalError::UnknownType(_) => BridgeError::ClassNotFound(e.to_string()),
            MarshalError::Namespace(e) => e.into(),
            MarshalError::Native(e) => BridgeError::NativeFailure(e),
            MarshalError::TypeMismatch { .. }
            | MarshalError::OutOfRange { .. }
            | MarshalError::InvalidEnumValue { .. }
            | MarshalError::Malformed { .. }
            | MarshalError::NotConstructible(_) => BridgeError::InvalidArgument(e.to_string()),
        }
    }
}

impl From<ConfigError> for BridgeError {
    fn from(e: ConfigError) -> Self {
        BridgeError::InvalidArgument(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_failure_keeps_message() {
        let err = BridgeError::from(NativeError::failure("Echo failed"));
        assert_eq!(err.code(), ErrorCode::NativeFailure);
        assert_eq!(err.message(), "Echo failed");
        assert_eq!(
            err.to_script(),
            json!({"code": "NativeFailure", "message": "Echo failed"})
        );
    }

    #[test]
    fn test_namespace_mapping() {
        let err = BridgeError::from(NamespaceError::UnknownNamespace("X.Y".into()));
        assert_eq!(err.code(), ErrorCode::ClassNotFound);
        let err = BridgeError::from(NamespaceError::Invalid("bad".into()));
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_marshal_mapping() {
        let err = BridgeError::from(MarshalError::OutOfRange {
            value: "300".into(),
            target: "u8".into(),
        });
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        let err = BridgeError::from(MarshalError::InstanceNotFound(InstanceNotFound {
            type_name: "A.B".into(),
            id: 4,
        }));
        assert_eq!(err.code(), ErrorCode::InstanceNotFound);
    }
}
