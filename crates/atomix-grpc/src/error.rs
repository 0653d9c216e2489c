// ABOUTME: Error types for atomix primitive calls.
// ABOUTME: Translates transport failures into a closed set of error kinds by status code.

use std::fmt;

use thiserror::Error;
use tonic::Code;

use crate::context::ContextError;

/// Result alias used across the atomix crates.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The closed set of failure kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The mutation conflicted with existing state.
    AlreadyExists,
    /// The target does not exist.
    NotFound,
    /// The caller canceled the operation.
    Canceled,
    /// The deadline passed before the operation completed.
    Timeout,
    /// The request was malformed or out of range.
    Invalid,
    /// A precondition failed or the operation raced another writer.
    Conflict,
    Unauthorized,
    Forbidden,
    NotSupported,
    /// The service or connection is unavailable.
    Unavailable,
    Internal,
    Unknown,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::NotFound => "not found",
            ErrorKind::Canceled => "canceled",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotSupported => "not supported",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Internal => "internal",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Code> for ErrorKind {
    fn from(code: Code) -> Self {
        match code {
            Code::AlreadyExists => ErrorKind::AlreadyExists,
            Code::NotFound => ErrorKind::NotFound,
            Code::Cancelled => ErrorKind::Canceled,
            Code::DeadlineExceeded => ErrorKind::Timeout,
            Code::InvalidArgument | Code::OutOfRange => ErrorKind::Invalid,
            Code::FailedPrecondition | Code::Aborted => ErrorKind::Conflict,
            Code::Unauthenticated => ErrorKind::Unauthorized,
            Code::PermissionDenied => ErrorKind::Forbidden,
            Code::Unimplemented => ErrorKind::NotSupported,
            Code::Unavailable | Code::ResourceExhausted => ErrorKind::Unavailable,
            Code::Internal | Code::DataLoss => ErrorKind::Internal,
            Code::Ok | Code::Unknown => ErrorKind::Unknown,
        }
    }
}

/// A translated failure from an atomix call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind == ErrorKind::AlreadyExists
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_canceled(&self) -> bool {
        self.kind == ErrorKind::Canceled
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    /// Canceled or timed out: the expected way for a stream to be torn down.
    pub fn is_teardown(&self) -> bool {
        self.is_canceled() || self.is_timeout()
    }
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Self {
        Error::new(status.code().into(), status.message())
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        Error::new(ErrorKind::Unavailable, err.to_string())
    }
}

impl From<ContextError> for Error {
    fn from(err: ContextError) -> Self {
        let kind = match err {
            ContextError::Canceled => ErrorKind::Canceled,
            ContextError::DeadlineExceeded => ErrorKind::Timeout,
        };
        Error::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::new(ErrorKind::NotFound, "no such element");
        assert_eq!(err.to_string(), "not found: no such element");

        let err = Error::invalid("primitive name must not be empty");
        assert_eq!(
            err.to_string(),
            "invalid: primitive name must not be empty"
        );
    }

    #[test]
    fn test_error_display_without_message() {
        let err: Error = tonic::Status::not_found("").into();
        assert_eq!(err.to_string(), "not found");

        let err = Error::new(ErrorKind::Unavailable, String::new());
        assert_eq!(err.to_string(), "unavailable");
    }

    #[test]
    fn test_from_tonic_status_classifies_by_code() {
        let cases = [
            (tonic::Status::already_exists("x"), ErrorKind::AlreadyExists),
            (tonic::Status::not_found("x"), ErrorKind::NotFound),
            (tonic::Status::cancelled("x"), ErrorKind::Canceled),
            (tonic::Status::deadline_exceeded("x"), ErrorKind::Timeout),
            (tonic::Status::invalid_argument("x"), ErrorKind::Invalid),
            (tonic::Status::out_of_range("x"), ErrorKind::Invalid),
            (tonic::Status::failed_precondition("x"), ErrorKind::Conflict),
            (tonic::Status::aborted("x"), ErrorKind::Conflict),
            (tonic::Status::unauthenticated("x"), ErrorKind::Unauthorized),
            (tonic::Status::permission_denied("x"), ErrorKind::Forbidden),
            (tonic::Status::unimplemented("x"), ErrorKind::NotSupported),
            (tonic::Status::unavailable("x"), ErrorKind::Unavailable),
            (tonic::Status::resource_exhausted("x"), ErrorKind::Unavailable),
            (tonic::Status::internal("x"), ErrorKind::Internal),
            (tonic::Status::data_loss("x"), ErrorKind::Internal),
            (tonic::Status::unknown("x"), ErrorKind::Unknown),
        ];
        for (status, expected) in cases {
            let code = status.code();
            let err: Error = status.into();
            assert_eq!(err.kind(), expected, "code {:?}", code);
        }
    }

    #[test]
    fn test_classification_ignores_message_text() {
        // A message that reads like another kind must not change the classification.
        let err: Error = tonic::Status::internal("already exists").into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_already_exists());
    }

    #[test]
    fn test_from_context_error() {
        let err: Error = ContextError::Canceled.into();
        assert!(err.is_canceled());
        assert!(err.is_teardown());

        let err: Error = ContextError::DeadlineExceeded.into();
        assert!(err.is_timeout());
        assert!(err.is_teardown());
    }

    #[test]
    fn test_teardown_excludes_faults() {
        let err = Error::new(ErrorKind::Unavailable, "connection reset");
        assert!(!err.is_teardown());
    }

    #[test]
    fn test_message_preserved() {
        let err: Error = tonic::Status::not_found("element 'a'").into();
        assert_eq!(err.message(), "element 'a'");
    }
}
