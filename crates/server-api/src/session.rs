//! Session lifecycle and authentication endpoints.

use std::sync::Arc;

use phoebe_protocol::{
    AuthConfig, AuthToken, ClientError, Credentials, ErrorKind, HttpMethod, HttpTransport,
    Registration, SessionDescriptor, SessionId, TokenResponse, UserInfo,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::base::{declared_failure, segment_path, BaseApi, ConnectionSettings};

pub(crate) mod paths {
    pub const START_SESSION: &str = "/dash/start-session";
    pub const END_SESSION: &str = "/dash/end-session";
    pub const SESSIONS: &str = "/dash/sessions";
    pub const SESSION_MEMORY: &str = "/dash/session-memory";
    pub const PORT_STATUS: &str = "/dash/port-status";
    pub const AUTH_CONFIG: &str = "/auth/config";
    pub const REGISTER: &str = "/auth/register";
    pub const LOGIN: &str = "/auth/login";
    pub const ME: &str = "/auth/me";
}

/// Client for the server's `/dash` session endpoints and `/auth` endpoints.
///
/// Failures are [`ClientError::Session`], except login and register which
/// always fail with [`ClientError::Authentication`].
#[derive(Debug)]
pub struct SessionApi {
    base: BaseApi,
}

impl SessionApi {
    /// Creates an unauthenticated session client.
    pub fn new(transport: Arc<dyn HttpTransport>, settings: ConnectionSettings) -> Self {
        Self {
            base: BaseApi::new(transport, settings),
        }
    }

    /// Shared request plumbing.
    pub fn base(&self) -> &BaseApi {
        &self.base
    }

    /// Sets or clears the bearer token without a network call.
    pub fn set_token(&self, token: Option<AuthToken>) {
        self.base.set_token(token);
    }

    /// Returns the current bearer token.
    pub fn token(&self) -> Option<AuthToken> {
        self.base.token()
    }

    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.base
            .request(ErrorKind::Session, HttpMethod::Get, path, None)
            .await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, ClientError> {
        self.base
            .request(ErrorKind::Session, HttpMethod::Post, path, body)
            .await
    }

    // ---- auth ---------------------------------------------------------

    /// Discovers which authentication mode the server expects.
    #[instrument(skip(self))]
    pub async fn get_auth_config(&self) -> Result<AuthConfig, ClientError> {
        let value = self.get(paths::AUTH_CONFIG).await?;
        decode(ErrorKind::Session, value)
    }

    /// Registers a new account and, on success, stores the issued token.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<TokenResponse, ClientError> {
        self.authenticate(paths::REGISTER, registration).await
    }

    /// Logs in and, on success, stores the issued token.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ClientError> {
        self.authenticate(paths::LOGIN, credentials).await
    }

    async fn authenticate<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<TokenResponse, ClientError> {
        let body = phoebe_protocol::to_json_value(body)?;
        let value = self
            .post(path, Some(body))
            .await
            .map_err(ClientError::into_authentication)?;
        let response: TokenResponse = decode(ErrorKind::Authentication, value)?;

        if let Some(token) = &response.access_token {
            self.base.set_token(Some(token.clone()));
            info!("authenticated; bearer token stored");
        }
        Ok(response)
    }

    /// Returns the identity behind the current token.
    #[instrument(skip(self))]
    pub async fn get_me(&self) -> Result<UserInfo, ClientError> {
        let value = self.get(paths::ME).await?;
        decode(ErrorKind::Session, value)
    }

    // ---- sessions -----------------------------------------------------

    /// Starts a server session. `metadata`, when given, is sent as the body.
    #[instrument(skip(self, metadata))]
    pub async fn start_session(
        &self,
        metadata: Option<Value>,
    ) -> Result<SessionDescriptor, ClientError> {
        let body = metadata.filter(|m| !m.is_null());
        let value = self.post(paths::START_SESSION, body).await?;

        let has_id = value
            .get("session_id")
            .and_then(Value::as_str)
            .is_some_and(|id| !id.is_empty());
        if !has_id {
            return Err(ClientError::new(
                ErrorKind::Session,
                "server response did not include a session_id",
            ));
        }

        let descriptor: SessionDescriptor = decode(ErrorKind::Session, value)?;
        info!(session_id = %descriptor.session_id, "session started");
        Ok(descriptor)
    }

    /// Ends `session_id` on the server.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn end_session(&self, session_id: &SessionId) -> Result<Value, ClientError> {
        let path = segment_path(paths::END_SESSION, session_id.as_str())?;
        let value = self.post(&path, None).await?;
        if let Some(message) = declared_failure(&value) {
            return Err(ClientError::new(ErrorKind::Session, message));
        }
        info!("session ended");
        Ok(value)
    }

    /// Raw `GET /dash/sessions` response.
    #[instrument(skip(self))]
    pub async fn get_sessions(&self) -> Result<Value, ClientError> {
        self.get(paths::SESSIONS).await
    }

    /// Sessions visible to the current identity, as typed descriptors.
    #[instrument(skip(self))]
    pub async fn list_sessions(&self) -> Result<Vec<SessionDescriptor>, ClientError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Listing {
            Wrapped { sessions: Vec<SessionDescriptor> },
            Bare(Vec<SessionDescriptor>),
        }

        let value = self.get(paths::SESSIONS).await?;
        Ok(match decode(ErrorKind::Session, value)? {
            Listing::Wrapped { sessions } | Listing::Bare(sessions) => sessions,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_memory_usage(&self) -> Result<Value, ClientError> {
        self.get(paths::SESSION_MEMORY).await
    }

    #[instrument(skip(self))]
    pub async fn get_port_status(&self) -> Result<Value, ClientError> {
        self.get(paths::PORT_STATUS).await
    }
}

fn decode<T: DeserializeOwned>(kind: ErrorKind, value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value)
        .map_err(|e| ClientError::new(kind, format!("unexpected response shape: {e}")))
}
