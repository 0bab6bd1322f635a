//! Errors - failure taxonomy for execution-time lookups.
//!
//! Two layers:
//! - [`CommsError`]: the supervisor round trip itself failed (transport level).
//! - [`ExecutionError`]: everything an accessor, the resolver or the context
//!   stack can report to task code. Transport failures are wrapped, never
//!   retried here.

use std::time::Duration;

use thiserror::Error;

use super::ids::RequestId;
use super::messages::{ErrorResponse, ErrorType, ToTask};

/// ErrorKind classifies an [`ExecutionError`] for the task-attempt supervisor.
///
/// - Recoverable: the caller may fall back (e.g. a default value).
/// - Fatal: a bug or bad input in the calling expression.
/// - Infrastructure: the supervisor channel is unusable; the attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Recoverable,
    Fatal,
    Infrastructure,
}

/// Transport-level failure of the supervisor channel.
#[derive(Debug, Error)]
pub enum CommsError {
    #[error("supervisor channel is closed")]
    Disconnected,

    #[error("no response from supervisor within {0:?}")]
    Timeout(Duration),

    #[error("response {got} does not answer request {expected}")]
    Mismatched { expected: RequestId, got: RequestId },

    #[error("failed to start the comms runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{error}: {reference} does not exist")]
    NotFound {
        error: ErrorType,
        reference: String,
        detail: serde_json::Value,
    },

    #[error("key {0} not found")]
    KeyNotFound(String),

    #[error("malformed payload for {what}: {source}")]
    MalformedPayload {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("current context was requested but no context was set")]
    NoActiveContext,

    #[error("inlet index {index} is out of range ({len} inlets declared)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{0} is not a declared inlet of this task")]
    UndeclaredInlet(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("unexpected response to {request}: {response}")]
    UnexpectedResponse {
        request: &'static str,
        response: &'static str,
    },

    #[error("supervisor returned {}: {}", .0.error, .0.detail)]
    Remote(ErrorResponse),

    #[error("key <{0}> must be string")]
    NonStringContextKey(String),

    #[error("value of key <{key}> must be string, not <{found}>")]
    NonStringContextValue { key: String, found: &'static str },

    #[error(transparent)]
    Transport(#[from] CommsError),
}

impl ExecutionError {
    pub(crate) fn unexpected(request: &'static str, response: &ToTask) -> Self {
        Self::UnexpectedResponse {
            request,
            response: response.name(),
        }
    }

    /// True for lookups that missed on the supervisor side.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True only for a miss of the given kind, e.g. `VARIABLE_NOT_FOUND`.
    pub fn is_not_found_of(&self, kind: ErrorType) -> bool {
        matches!(self, Self::NotFound { error, .. } if *error == kind)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::KeyNotFound(_) => ErrorKind::Recoverable,
            Self::Transport(_) | Self::Remote(_) | Self::UnexpectedResponse { .. } => {
                ErrorKind::Infrastructure
            }
            Self::MalformedPayload { .. }
            | Self::NoActiveContext
            | Self::IndexOutOfRange { .. }
            | Self::UndeclaredInlet(_)
            | Self::InvalidReference(_)
            | Self::NonStringContextKey(_)
            | Self::NonStringContextValue { .. } => ErrorKind::Fatal,
        }
    }
}

impl ErrorResponse {
    /// Turns a supervisor error into the matching [`ExecutionError`].
    ///
    /// `*_NOT_FOUND` responses become [`ExecutionError::NotFound`] naming the
    /// reference the caller asked for; anything else is reported as-is.
    pub fn into_error(self, reference: impl ToString) -> ExecutionError {
        if self.error.is_not_found() {
            ExecutionError::NotFound {
                error: self.error,
                reference: reference.to_string(),
                detail: self.detail,
            }
        } else {
            ExecutionError::Remote(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn not_found_responses_are_recoverable() {
        let err = ErrorResponse {
            error: ErrorType::VariableNotFound,
            detail: json!({"key": "missing"}),
        }
        .into_error("variable missing");

        assert!(err.is_not_found());
        assert_eq!(err.kind(), ErrorKind::Recoverable);
        assert_eq!(
            err.to_string(),
            "VARIABLE_NOT_FOUND: variable missing does not exist"
        );
    }

    #[test]
    fn generic_errors_are_not_downgraded_to_not_found() {
        let err = ErrorResponse {
            error: ErrorType::GenericError,
            detail: json!("boom"),
        }
        .into_error("anything");

        assert!(!err.is_not_found());
        assert!(matches!(err, ExecutionError::Remote(_)));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }

    #[test]
    fn transport_failures_are_infrastructure() {
        let err = ExecutionError::from(CommsError::Disconnected);
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(err.to_string(), "supervisor channel is closed");
    }
}
