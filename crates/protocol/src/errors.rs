//! Error kinds surfaced by every layer of the PHOEBE client.
//!
//! [`ClientError`] is the single root error type. Each variant is one of the
//! error *kinds* callers branch on: session lifecycle, authentication, command
//! execution, and caller-side parameter problems. Transport failures never leak
//! as raw HTTP-library errors; they are folded into the kind of the API call
//! that issued them, with [`TransportError`] describing what went wrong.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Transport-level failure
// ---------------------------------------------------------------------------

/// A request that never produced an HTTP response.
///
/// Produced by [`crate::HttpTransport`] implementations for connection refusal,
/// DNS failure, TLS failure, body read failure, or an elapsed timeout.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct TransportError {
    /// Human-readable description of the failure.
    pub message: String,
    /// `true` when the configured request timeout elapsed.
    pub timeout: bool,
}

impl TransportError {
    /// Creates a non-timeout transport failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: false,
        }
    }

    /// Creates a transport failure caused by the request timeout elapsing.
    pub fn timed_out(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

/// Discriminant of a [`ClientError`], for callers that only need the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Session lifecycle or connectivity failure.
    Session,
    /// Login, registration, or token failure.
    Authentication,
    /// A domain command reported failure.
    Command,
    /// Invalid caller input detected before any network call.
    Parameter,
}

/// Root error type for the PHOEBE client.
///
/// The server's message is always preserved verbatim in `message`. `status`
/// carries the HTTP status code when the failure came from an HTTP response;
/// it is `None` for transport failures and caller errors.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ClientError {
    /// Session lifecycle or connectivity failure.
    ///
    /// Produced by: every `SessionApi` call except login/register.
    #[error("Session error: {message}")]
    Session {
        /// Server-supplied or transport-supplied description.
        message: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// `true` when the request timeout elapsed.
        timeout: bool,
    },

    /// Authentication failure.
    ///
    /// Produced by: login and register, regardless of the underlying cause.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Server-supplied or transport-supplied description.
        message: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
    },

    /// A domain command failed.
    ///
    /// Produced by: `PhoebeApi::execute` on a non-2xx status, a transport
    /// failure, or a 2xx body carrying `"success": false`.
    #[error("Command error: {message}")]
    Command {
        /// Server-supplied or transport-supplied description.
        message: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// `true` when the request timeout elapsed.
        timeout: bool,
    },

    /// The caller supplied missing or invalid input.
    ///
    /// Always raised before any network call is made.
    #[error("Parameter error: {message}")]
    Parameter {
        /// Description of the problem.
        message: String,
    },
}

impl ClientError {
    /// Creates a [`ClientError::Parameter`].
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter {
            message: message.into(),
        }
    }

    /// Creates an error of `kind` with no HTTP status.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::with_kind(kind, message.into(), None, false)
    }

    /// Creates an error of `kind` from an HTTP response status and message.
    pub fn from_status(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self::with_kind(kind, message.into(), Some(status), false)
    }

    /// Creates an error of `kind` from a transport failure.
    pub fn from_transport(kind: ErrorKind, err: TransportError) -> Self {
        Self::with_kind(kind, err.message, None, err.timeout)
    }

    fn with_kind(kind: ErrorKind, message: String, status: Option<u16>, timeout: bool) -> Self {
        match kind {
            ErrorKind::Session => Self::Session {
                message,
                status,
                timeout,
            },
            ErrorKind::Authentication => Self::Authentication { message, status },
            ErrorKind::Command => Self::Command {
                message,
                status,
                timeout,
            },
            ErrorKind::Parameter => Self::Parameter { message },
        }
    }

    /// Re-labels this error as an authentication failure, keeping its message
    /// and status. Parameter errors are returned unchanged.
    pub fn into_authentication(self) -> Self {
        match self {
            Self::Session {
                message, status, ..
            }
            | Self::Command {
                message, status, ..
            } => Self::Authentication { message, status },
            other => other,
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Session { .. } => ErrorKind::Session,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Command { .. } => ErrorKind::Command,
            Self::Parameter { .. } => ErrorKind::Parameter,
        }
    }

    /// Returns the preserved message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Session { message, .. }
            | Self::Authentication { message, .. }
            | Self::Command { message, .. }
            | Self::Parameter { message } => message,
        }
    }

    /// Returns the HTTP status, if the failure came from an HTTP response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Session { status, .. }
            | Self::Authentication { status, .. }
            | Self::Command { status, .. } => *status,
            Self::Parameter { .. } => None,
        }
    }

    /// Returns `true` for 401 and 403 responses.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// Returns `true` when the request timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Session { timeout, .. } | Self::Command { timeout, .. } => *timeout,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_selects_variant_by_kind() {
        let err = ClientError::from_status(ErrorKind::Command, 500, "boom");
        assert_eq!(err.kind(), ErrorKind::Command);
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "Command error: boom");
    }

    #[test]
    fn transport_timeout_is_flagged() {
        let err = ClientError::from_transport(
            ErrorKind::Session,
            TransportError::timed_out("operation timed out"),
        );
        assert!(err.is_timeout());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn into_authentication_keeps_message_and_status() {
        let err = ClientError::from_status(ErrorKind::Session, 401, "bad credentials")
            .into_authentication();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.status(), Some(401));
        assert!(err.is_auth_failure());
        assert_eq!(err.message(), "bad credentials");
    }

    #[test]
    fn parameter_errors_stay_parameter_errors() {
        let err = ClientError::parameter("missing qualifier").into_authentication();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(!err.is_auth_failure());
    }
}
