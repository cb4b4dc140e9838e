//! Error types for the watermark workflow.
//!
//! This module defines the central `Error` enum returned by the workflow
//! service and passed through the endpoint layer untouched. Each variant
//! belongs to exactly one [`ErrorKind`], and the kind is the only input the
//! transports use to pick a protocol status:
//!
//! | kind              | HTTP | gRPC               |
//! |-------------------|------|--------------------|
//! | `InvalidArgument` | 400  | `INVALID_ARGUMENT` |
//! | `Unknown`         | 404  | `NOT_FOUND`        |
//! | `Internal`        | 500  | `INTERNAL`         |
//!
//! ## Error Cases
//! - `InvalidArgument`: Malformed input or an illegal ticket transition.
//! - `Unknown`: The ticket does not exist or the store is unavailable.
//! - `Internal`: Unexpected failure. The detail is logged, never returned.
//! - `Cancelled`: The request context was cancelled (service shutting down).
//! - `DeadlineExceeded`: The endpoint timeout elapsed.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Classification shared by every transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Unknown,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::Unknown => "unknown",
            Self::Internal => "internal",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the watermark workflow.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The caller supplied malformed or out-of-policy input.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The requested entity is absent or a dependency is unavailable.
    #[error("unknown: {reason}")]
    Unknown { reason: String },

    /// Unexpected failure. `context` is for logs only.
    #[error("internal error: {context}")]
    Internal { context: String },

    /// The request context was cancelled before the operation ran.
    #[error("request cancelled")]
    Cancelled,

    /// The endpoint deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown {
            reason: reason.into(),
        }
    }

    pub fn internal(context: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Unknown { .. } => ErrorKind::Unknown,
            Self::Internal { .. } | Self::Cancelled | Self::DeadlineExceeded => {
                ErrorKind::Internal
            }
        }
    }

    /// Message safe to hand to a caller. Internal detail is redacted.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal { .. } => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        let message = err.public_message();
        match err.kind() {
            ErrorKind::Unknown => Status::not_found(message),
            ErrorKind::InvalidArgument => Status::invalid_argument(message),
            ErrorKind::Internal => Status::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn kinds_map_to_grpc_codes() {
        let cases = [
            (Error::unknown("ticket abc not found"), Code::NotFound),
            (Error::invalid_argument("mark is empty"), Code::InvalidArgument),
            (Error::internal("lock poisoned"), Code::Internal),
            (Error::Cancelled, Code::Internal),
            (Error::DeadlineExceeded, Code::Internal),
        ];
        for (err, code) in cases {
            assert_eq!(Status::from(err).code(), code);
        }
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = Error::internal("store shard 3 returned EIO");
        assert_eq!(err.public_message(), "internal error");
        let status = Status::from(err);
        assert!(!status.message().contains("EIO"));
    }

    #[test]
    fn client_errors_keep_their_reason() {
        let err = Error::invalid_argument("unrecognized filter key `color`");
        assert_eq!(
            err.public_message(),
            "invalid argument: unrecognized filter key `color`"
        );
    }
}
