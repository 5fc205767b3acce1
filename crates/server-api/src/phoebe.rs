//! Domain command dispatch over `POST /send/{session_id}`.
//!
//! Every PHOEBE operation travels through [`PhoebeApi::execute`]. The command
//! name is opaque to the client; the server resolves it against its bundle.

use std::sync::{Arc, PoisonError, RwLock};

use phoebe_protocol::{
    AuthToken, ClientError, CommandArgs, CommandEnvelope, CommandName, ErrorKind, HttpMethod,
    HttpTransport, SessionId,
};
use serde_json::Value;
use tracing::{instrument, warn};

use crate::base::{declared_failure, segment_path, BaseApi, ConnectionSettings};

const SEND_PATH: &str = "/send";

/// Client for PHOEBE command execution within one server session.
#[derive(Debug)]
pub struct PhoebeApi {
    base: BaseApi,
    session_id: RwLock<Option<SessionId>>,
}

impl PhoebeApi {
    /// Creates a command client with no session and no token.
    pub fn new(transport: Arc<dyn HttpTransport>, settings: ConnectionSettings) -> Self {
        Self {
            base: BaseApi::new(transport, settings),
            session_id: RwLock::new(None),
        }
    }

    /// Shared request plumbing.
    pub fn base(&self) -> &BaseApi {
        &self.base
    }

    /// Sets or clears the bearer token sent with commands.
    pub fn set_token(&self, token: Option<AuthToken>) {
        self.base.set_token(token);
    }

    /// Returns the current bearer token.
    pub fn token(&self) -> Option<AuthToken> {
        self.base.token()
    }

    /// Sets or clears the session that scopes subsequent commands.
    pub fn set_session_id(&self, session_id: Option<SessionId>) {
        *self
            .session_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = session_id;
    }

    /// Returns the session commands are sent to.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sends `command` with `args` to the active session and returns the
    /// server's JSON result.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Parameter`] when no session is set or `command` is
    ///   empty. No request is sent.
    /// - [`ClientError::Command`] on a transport failure, a non-2xx status, or
    ///   a response declaring `"success": false`.
    #[instrument(skip(self, args), fields(session_id = tracing::field::Empty))]
    pub async fn execute(&self, command: &str, args: CommandArgs) -> Result<Value, ClientError> {
        let session_id = self.session_id().ok_or_else(|| {
            ClientError::parameter("No session ID set. Call set_session_id() first.")
        })?;
        tracing::Span::current().record("session_id", tracing::field::display(&session_id));

        let name = CommandName::new(command)
            .ok_or_else(|| ClientError::parameter("command name must not be empty"))?;

        let body = CommandEnvelope::new(name, args).into_body();
        let path = segment_path(SEND_PATH, session_id.as_str())?;
        let (status, value) = self
            .base
            .exchange(ErrorKind::Command, HttpMethod::Post, &path, Some(body))
            .await?;

        if let Some(message) = declared_failure(&value) {
            warn!(%message, "command reported failure");
            return Err(ClientError::from_status(ErrorKind::Command, status, message));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;
    use phoebe_protocol::{HttpResponse, NumericArray, TransportError};
    use serde_json::json;

    fn api() -> (Arc<RecordingTransport>, PhoebeApi) {
        let transport = Arc::new(RecordingTransport::new());
        let api = PhoebeApi::new(transport.clone(), ConnectionSettings::default());
        (transport, api)
    }

    #[tokio::test]
    async fn execute_without_session_sends_nothing() {
        let (transport, api) = api();
        let err = api.execute("get_datasets", CommandArgs::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_command_name_is_rejected_before_sending() {
        let (transport, api) = api();
        api.set_session_id(SessionId::new("S"));
        let err = api.execute("", CommandArgs::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn execute_posts_flat_envelope_to_session_path() {
        let (transport, api) = api();
        api.set_session_id(SessionId::new("S"));
        transport.respond(
            HttpMethod::Post,
            "/send/S",
            HttpResponse::json(200, &json!({"success": true, "result": {"times": [0.0]}})),
        );

        let args = CommandArgs::new()
            .with("dataset", "lc01")
            .unwrap()
            .with("times", NumericArray::from(vec![0.0, 0.25]))
            .unwrap();
        let result = api.execute("add_dataset", args).await.unwrap();
        assert_eq!(result["result"]["times"], json!([0.0]));

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, "http://localhost:8001/send/S");
        assert_eq!(
            sent.body,
            Some(json!({"command": "add_dataset", "dataset": "lc01", "times": [0.0, 0.25]}))
        );
    }

    #[tokio::test]
    async fn session_id_stays_inside_the_send_path() {
        let (transport, api) = api();
        api.set_session_id(SessionId::new("../dash/end-session/VICTIM"));
        api.execute("get_value", CommandArgs::new()).await.unwrap_err();

        let sent = transport.last_request().unwrap();
        assert_eq!(
            sent.url,
            "http://localhost:8001/send/..%2Fdash%2Fend-session%2FVICTIM"
        );
        assert_eq!(transport.count(HttpMethod::Post, "/dash/end-session/VICTIM"), 0);
    }

    #[tokio::test]
    async fn dot_session_id_is_rejected_before_sending() {
        let (transport, api) = api();
        api.set_session_id(SessionId::new(".."));
        let err = api.execute("get_value", CommandArgs::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn declared_failure_becomes_command_error() {
        let (transport, api) = api();
        api.set_session_id(SessionId::new("S"));
        transport.respond(
            HttpMethod::Post,
            "/send/S",
            HttpResponse::json(200, &json!({"success": false, "error": "twig not found"})),
        );
        let err = api.execute("get_value", CommandArgs::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Command);
        assert_eq!(err.status(), Some(200));
        assert_eq!(err.message(), "twig not found");
    }

    #[tokio::test]
    async fn forbidden_status_is_command_error_with_auth_message() {
        let (transport, api) = api();
        api.set_session_id(SessionId::new("S"));
        transport.respond(HttpMethod::Post, "/send/S", HttpResponse::new(403, ""));
        let err = api.execute("run_compute", CommandArgs::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Command);
        assert!(err.is_auth_failure());
        assert!(err.message().starts_with("Server authentication failed (status 403)"));
    }

    #[tokio::test]
    async fn timeout_is_command_error_flagged_as_timeout() {
        let (transport, api) = api();
        api.set_session_id(SessionId::new("S"));
        transport.fail(
            HttpMethod::Post,
            "/send/S",
            TransportError::timed_out("operation timed out"),
        );
        let err = api.execute("run_solver", CommandArgs::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Command);
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn token_is_attached_to_commands() {
        let (transport, api) = api();
        api.set_session_id(SessionId::new("S"));
        api.set_token(AuthToken::new("T"));
        transport.respond(HttpMethod::Post, "/send/S", HttpResponse::json(200, &json!({})));
        api.execute("get_bundle", CommandArgs::new()).await.unwrap();
        assert_eq!(
            transport.last_request().unwrap().header("Authorization"),
            Some("Bearer T")
        );
    }
}
