//! Typed views over the server's session and authentication payloads.
//!
//! The server's responses are open JSON objects. These types pick out the
//! fields the client relies on and keep everything else in an `extra` map so
//! no server-supplied detail is lost.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{AuthToken, SessionId};

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// A server session as returned by start-session and list-sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Identifier used to scope subsequent domain commands.
    pub session_id: SessionId,

    /// Remaining server-supplied fields (ports, owner, timestamps, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Authentication mode declared by `GET /auth/config`.
///
/// The client only reports this to the caller; it never branches on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthMode {
    /// The server accepts unauthenticated requests.
    None,
    /// Email/password accounts via `/auth/register` and `/auth/login`.
    Password,
    /// Externally issued JWTs supplied with `set_token`.
    Jwt,
    /// An external identity provider issues tokens.
    External,
    /// A mode this client version does not know about.
    Other(String),
}

impl AuthMode {
    /// Returns the wire name of this mode.
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Password => "password",
            Self::Jwt => "jwt",
            Self::External => "external",
            Self::Other(mode) => mode,
        }
    }
}

impl From<String> for AuthMode {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "password" => Self::Password,
            "jwt" | "token" => Self::Jwt,
            "external" => Self::External,
            _ => Self::Other(value),
        }
    }
}

impl From<AuthMode> for String {
    fn from(mode: AuthMode) -> Self {
        mode.as_str().to_string()
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of `GET /auth/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// The authentication mode the server expects.
    pub mode: AuthMode,

    /// Remaining server-supplied fields (e.g. external provider URLs).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `POST /auth/login` and `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The issued bearer token. Absent when the server declined to issue one.
    #[serde(default, deserialize_with = "non_empty_token")]
    pub access_token: Option<AuthToken>,

    /// Token scheme reported by the server, normally `"bearer"`.
    #[serde(default)]
    pub token_type: Option<String>,

    /// Remaining server-supplied fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Server-assigned user identifier (numeric ids are rendered as strings).
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,

    /// Remaining server-supplied fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Creates login credentials.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Body of `POST /auth/register`. Names default to empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Registration {
    /// Creates a registration with empty first and last names.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Sets the first and last names.
    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Deserialisation helpers
// ---------------------------------------------------------------------------

fn non_empty_token<'de, D>(deserializer: D) -> Result<Option<AuthToken>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(AuthToken::new))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auth_mode_parses_known_and_unknown_values() {
        let config: AuthConfig = serde_json::from_value(json!({"mode": "password"})).unwrap();
        assert_eq!(config.mode, AuthMode::Password);

        let config: AuthConfig =
            serde_json::from_value(json!({"mode": "saml", "issuer": "idp"})).unwrap();
        assert_eq!(config.mode, AuthMode::Other("saml".to_string()));
        assert_eq!(config.extra.get("issuer"), Some(&json!("idp")));
    }

    #[test]
    fn token_response_treats_empty_token_as_absent() {
        let resp: TokenResponse =
            serde_json::from_value(json!({"access_token": "", "token_type": "bearer"})).unwrap();
        assert!(resp.access_token.is_none());

        let resp: TokenResponse = serde_json::from_value(json!({"access_token": "T"})).unwrap();
        assert_eq!(resp.access_token.unwrap().expose(), "T");
    }

    #[test]
    fn user_info_accepts_numeric_user_id() {
        let user: UserInfo = serde_json::from_value(json!({
            "user_id": 42,
            "email": "a@b.com",
            "full_name": "Ada Lovelace",
            "role": "admin"
        }))
        .unwrap();
        assert_eq!(user.user_id, "42");
        assert_eq!(user.role.as_deref(), Some("admin"));
    }

    #[test]
    fn registration_defaults_names_to_empty() {
        let body = serde_json::to_value(Registration::new("a@b.com", "pw")).unwrap();
        assert_eq!(
            body,
            json!({"email": "a@b.com", "password": "pw", "first_name": "", "last_name": ""})
        );
    }
}
