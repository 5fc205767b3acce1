//! Newtype identifiers for the opaque strings that cross the wire.
//!
//! A session id, a command name and a bearer token are all `String` under the
//! hood. Wrapping each one prevents passing, say, a token where a session id
//! is expected, and lets construction reject empty values up front.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// Identifies a server-side PHOEBE session.
    ///
    /// Issued by `POST /dash/start-session`; scopes every domain command sent
    /// to `POST /send/{session_id}`.
    SessionId
}

string_id! {
    /// Names a server-defined domain command (e.g. `"set_value"`).
    ///
    /// The client never interprets the name; the server owns the catalogue.
    CommandName
}

// ---------------------------------------------------------------------------
// Bearer token
// ---------------------------------------------------------------------------

/// An opaque bearer credential sent as `Authorization: Bearer <token>`.
///
/// `Debug` is redacted so tokens never end up in logs. Use [`AuthToken::expose`]
/// where the raw value is genuinely needed (building the header).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthToken(String);

impl AuthToken {
    /// Creates a token, returning `None` if the value is empty.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        if v.is_empty() {
            None
        } else {
            Some(Self(v))
        }
    }

    /// Returns the raw token value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Formats the `Authorization` header value for this token.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identifiers_are_rejected() {
        assert!(SessionId::new("").is_none());
        assert!(CommandName::new(String::new()).is_none());
        assert!(AuthToken::new("").is_none());
    }

    #[test]
    fn session_id_serialises_as_plain_string() {
        let id = SessionId::new("abc-123").unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("abc-123"));
        assert_eq!(id.to_string(), "abc-123");
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = AuthToken::new("super-secret").unwrap();
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret"));
        assert_eq!(token.bearer_header(), "Bearer super-secret");
    }
}
