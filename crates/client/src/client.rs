//! The [`PhoebeClient`] facade.

use std::sync::Arc;

use phoebe_protocol::{
    AuthConfig, AuthToken, ClientError, CommandArgs, Credentials, ErrorKind, HttpTransport,
    Registration, SessionDescriptor, SessionId, TokenResponse, UserInfo,
};
use phoebe_server_api::{PhoebeApi, ReqwestTransport, SessionApi};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::ClientConfig;

/// Unified access to a PHOEBE server.
///
/// Holds one [`SessionApi`] and one [`PhoebeApi`] that share a transport.
/// Cloning is cheap and clones share the token and the active session; use
/// separate [`PhoebeClient::new`] instances for independent sessions.
#[derive(Debug, Clone)]
pub struct PhoebeClient {
    pub(crate) sessions: Arc<SessionApi>,
    pub(crate) phoebe: Arc<PhoebeApi>,
}

impl PhoebeClient {
    /// Builds a client backed by [`ReqwestTransport`].
    ///
    /// No request is made; see [`PhoebeClient::connect`] for `auto_session`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Session`] if the HTTP client cannot be initialised.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new()
            .map_err(|e| ClientError::from_transport(ErrorKind::Session, e))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Builds a client over a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let client = Self {
            sessions: Arc::new(SessionApi::new(
                Arc::clone(&transport),
                config.connection.clone(),
            )),
            phoebe: Arc::new(PhoebeApi::new(transport, config.connection)),
        };
        if config.token.is_some() {
            client.set_token(config.token);
        }
        client
    }

    /// Builds a client and, if `config.auto_session` is set, starts a session.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let auto_session = config.auto_session;
        Self::finish_connect(Self::new(config)?, auto_session).await
    }

    /// [`PhoebeClient::connect`] over a caller-supplied transport.
    pub async fn connect_with_transport(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ClientError> {
        let auto_session = config.auto_session;
        Self::finish_connect(Self::with_transport(config, transport), auto_session).await
    }

    async fn finish_connect(client: Self, auto_session: bool) -> Result<Self, ClientError> {
        if auto_session {
            client.start_session(None).await?;
        }
        Ok(client)
    }

    /// The session/auth API this facade delegates to.
    pub fn sessions(&self) -> &SessionApi {
        &self.sessions
    }

    /// The command API this facade delegates to.
    pub fn phoebe(&self) -> &PhoebeApi {
        &self.phoebe
    }

    // ---- auth ---------------------------------------------------------

    /// Discovers which authentication mode the server expects.
    pub async fn get_auth_config(&self) -> Result<AuthConfig, ClientError> {
        self.sessions.get_auth_config().await
    }

    /// Registers a new user and authorises both APIs with the issued token.
    pub async fn register(&self, registration: &Registration) -> Result<TokenResponse, ClientError> {
        require("email", &registration.email)?;
        let response = self.sessions.register(registration).await?;
        self.phoebe.set_token(self.sessions.token());
        Ok(response)
    }

    /// Logs in and authorises both APIs with the issued token.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ClientError> {
        require("email", email)?;
        let response = self
            .sessions
            .login(&Credentials::new(email, password))
            .await?;
        self.phoebe.set_token(self.sessions.token());
        Ok(response)
    }

    /// Sets or clears the bearer token on both APIs (e.g. an external JWT).
    pub fn set_token(&self, token: Option<AuthToken>) {
        debug!(present = token.is_some(), "setting bearer token");
        self.sessions.set_token(token.clone());
        self.phoebe.set_token(token);
    }

    /// Returns the bearer token shared by both APIs.
    pub fn token(&self) -> Option<AuthToken> {
        self.sessions.token()
    }

    /// Returns the identity behind the current token.
    pub async fn get_me(&self) -> Result<UserInfo, ClientError> {
        self.sessions.get_me().await
    }

    // ---- sessions -----------------------------------------------------

    /// Starts a server session and makes it the active one.
    pub async fn start_session(
        &self,
        metadata: Option<Value>,
    ) -> Result<SessionDescriptor, ClientError> {
        let descriptor = self.sessions.start_session(metadata).await?;
        self.phoebe
            .set_session_id(Some(descriptor.session_id.clone()));
        Ok(descriptor)
    }

    /// Makes `session_id` the active session without a network call.
    pub fn set_session_id(&self, session_id: Option<SessionId>) {
        self.phoebe.set_session_id(session_id);
    }

    /// Returns the active session, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        self.phoebe.session_id()
    }

    /// Ends `session_id`, or the active session when `None`.
    ///
    /// Returns `Ok(None)` without a request when there is nothing to end. The
    /// active session is cleared only when the server confirms the end.
    pub async fn end_session(
        &self,
        session_id: Option<SessionId>,
    ) -> Result<Option<Value>, ClientError> {
        let Some(target) = session_id.or_else(|| self.phoebe.session_id()) else {
            return Ok(None);
        };
        let response = self.sessions.end_session(&target).await?;
        if self.phoebe.session_id().as_ref() == Some(&target) {
            self.phoebe.set_session_id(None);
        }
        Ok(Some(response))
    }

    /// Raw listing of the sessions visible to the current identity.
    pub async fn get_sessions(&self) -> Result<Value, ClientError> {
        self.sessions.get_sessions().await
    }

    /// Sessions visible to the current identity, as typed descriptors.
    pub async fn list_sessions(&self) -> Result<Vec<SessionDescriptor>, ClientError> {
        self.sessions.list_sessions().await
    }

    /// Per-session memory usage reported by the server.
    pub async fn get_memory_usage(&self) -> Result<Value, ClientError> {
        self.sessions.get_memory_usage().await
    }

    /// Worker port allocation reported by the server.
    pub async fn get_port_status(&self) -> Result<Value, ClientError> {
        self.sessions.get_port_status().await
    }

    // ---- PHOEBE operations -------------------------------------------

    /// Sends any server command. Use this for commands without a dedicated
    /// method below.
    pub async fn execute(&self, command: &str, args: CommandArgs) -> Result<Value, ClientError> {
        info!(command, "executing command");
        self.phoebe.execute(command, args).await
    }

    /// Sets the binary's morphology (e.g. `detached`, `contact_binary`).
    pub async fn set_morphology(&self, morphology: &str) -> Result<Value, ClientError> {
        require("morphology", morphology)?;
        self.execute("set_morphology", CommandArgs::new().with("morphology", morphology)?)
            .await
    }

    /// Attaches parameter definitions to the bundle.
    pub async fn attach_parameters(&self, parameters: Vec<Value>) -> Result<Value, ClientError> {
        self.execute("attach_parameters", CommandArgs::new().with("parameters", parameters)?)
            .await
    }

    /// Fetches one parameter by qualifier; `filter` narrows it (component,
    /// dataset, context, ...).
    pub async fn get_parameter(
        &self,
        qualifier: &str,
        filter: CommandArgs,
    ) -> Result<Value, ClientError> {
        require("qualifier", qualifier)?;
        let mut args = CommandArgs::new().with("qualifier", qualifier)?;
        args.extend(filter);
        self.execute("get_parameter", args).await
    }

    /// Whether the parameter with `uniqueid` is constrained by another.
    pub async fn is_parameter_constrained(&self, uniqueid: &str) -> Result<Value, ClientError> {
        require("uniqueid", uniqueid)?;
        self.execute(
            "is_parameter_constrained",
            CommandArgs::new().with("uniqueid", uniqueid)?,
        )
        .await
    }

    /// Refreshes the unique id of the parameter addressed by `twig`.
    pub async fn update_uniqueid(&self, twig: &str) -> Result<Value, ClientError> {
        require("twig", twig)?;
        self.execute("update_uniqueid", CommandArgs::new().with("twig", twig)?)
            .await
    }

    /// Value of the parameter selected by `filter`.
    pub async fn get_value(&self, filter: CommandArgs) -> Result<Value, ClientError> {
        self.execute("get_value", filter).await
    }

    /// Sets the parameter selected by `filter` to `value`.
    ///
    /// `value` may be any serialisable type, including a
    /// [`phoebe_protocol::NumericArray`].
    pub async fn set_value(
        &self,
        value: impl Serialize,
        filter: CommandArgs,
    ) -> Result<Value, ClientError> {
        let mut args = CommandArgs::new().with("value", value)?;
        args.extend(filter);
        self.execute("set_value", args).await
    }

    /// Adds a dataset described by `args` (kind, times, ...).
    pub async fn add_dataset(&self, args: CommandArgs) -> Result<Value, ClientError> {
        self.execute("add_dataset", args).await
    }

    /// Removes the dataset labelled `dataset`.
    pub async fn remove_dataset(&self, dataset: &str) -> Result<Value, ClientError> {
        require("dataset", dataset)?;
        self.execute("remove_dataset", CommandArgs::new().with("dataset", dataset)?)
            .await
    }

    /// Lists the bundle's datasets.
    pub async fn get_datasets(&self) -> Result<Value, ClientError> {
        self.execute("get_datasets", CommandArgs::new()).await
    }

    /// Runs the forward model.
    pub async fn run_compute(&self, args: CommandArgs) -> Result<Value, ClientError> {
        self.execute("run_compute", args).await
    }

    /// Runs a solver (e.g. a periodogram or optimiser).
    pub async fn run_solver(&self, args: CommandArgs) -> Result<Value, ClientError> {
        self.execute("run_solver", args).await
    }

    /// Full model snapshot of the session's bundle.
    pub async fn get_bundle(&self) -> Result<Value, ClientError> {
        self.execute("get_bundle", CommandArgs::new()).await
    }

    /// Replaces the session's bundle with a serialised snapshot.
    pub async fn load_bundle(&self, bundle: &str) -> Result<Value, ClientError> {
        require("bundle", bundle)?;
        self.execute("load_bundle", CommandArgs::new().with("bundle", bundle)?)
            .await
    }

    /// Serialises the session's bundle.
    pub async fn save_bundle(&self) -> Result<Value, ClientError> {
        self.execute("save_bundle", CommandArgs::new()).await
    }
}

fn require(field: &str, value: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        return Err(ClientError::parameter(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use phoebe_protocol::{HttpMethod, HttpResponse, NumericArray};
    use phoebe_server_api::testing::RecordingTransport;
    use serde_json::json;

    fn client() -> (Arc<RecordingTransport>, PhoebeClient) {
        let transport = Arc::new(RecordingTransport::new());
        let client = PhoebeClient::with_transport(ClientConfig::default(), transport.clone());
        (transport, client)
    }

    fn filter(pairs: &[(&str, &str)]) -> CommandArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    fn ok_send(transport: &RecordingTransport, session: &str) {
        transport.respond(
            HttpMethod::Post,
            &format!("/send/{session}"),
            HttpResponse::json(200, &json!({"success": true, "result": null})),
        );
    }

    #[tokio::test]
    async fn set_value_sends_documented_envelope() {
        let (transport, client) = client();
        client.set_session_id(SessionId::new("S"));
        ok_send(&transport, "S");

        client
            .set_value(1.5, filter(&[("qualifier", "period"), ("component", "binary")]))
            .await
            .unwrap();

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.url, "http://localhost:8001/send/S");
        assert_eq!(
            sent.body,
            Some(json!({
                "command": "set_value",
                "value": 1.5,
                "qualifier": "period",
                "component": "binary"
            }))
        );
    }

    #[tokio::test]
    async fn set_value_accepts_numeric_arrays() {
        let (transport, client) = client();
        client.set_session_id(SessionId::new("S"));
        ok_send(&transport, "S");

        let fluxes = NumericArray::from_rows(vec![vec![1.0, 0.98], vec![0.97, 1.0]]).unwrap();
        client
            .set_value(&fluxes, filter(&[("qualifier", "fluxes"), ("dataset", "lc01")]))
            .await
            .unwrap();

        let body = transport.last_request().unwrap().body.unwrap();
        assert_eq!(body["value"], json!([[1.0, 0.98], [0.97, 1.0]]));
    }

    #[tokio::test]
    async fn domain_methods_need_a_session_and_send_nothing_without_one() {
        let (transport, client) = client();

        let err = client.get_datasets().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        let err = client.set_value(2.0, CommandArgs::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        let err = client.run_compute(CommandArgs::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);

        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_required_field_is_rejected_before_sending() {
        let (transport, client) = client();
        client.set_session_id(SessionId::new("S"));
        let err = client.remove_dataset("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(err.message().contains("dataset"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn convenience_methods_forward_their_command_names() {
        let (transport, client) = client();
        client.set_session_id(SessionId::new("S"));
        ok_send(&transport, "S");

        client.set_morphology("contact_binary").await.unwrap();
        client.attach_parameters(vec![json!({"qualifier": "teff"})]).await.unwrap();
        client.get_parameter("teff", filter(&[("component", "primary")])).await.unwrap();
        client.is_parameter_constrained("U123").await.unwrap();
        client.update_uniqueid("teff@primary").await.unwrap();
        client.get_value(filter(&[("twig", "period@binary")])).await.unwrap();
        client.add_dataset(filter(&[("kind", "lc")])).await.unwrap();
        client.remove_dataset("lc01").await.unwrap();
        client.get_datasets().await.unwrap();
        client.run_compute(CommandArgs::new()).await.unwrap();
        client.run_solver(filter(&[("solver", "lc_periodogram")])).await.unwrap();
        client.get_bundle().await.unwrap();
        client.load_bundle("{\"params\": []}").await.unwrap();
        client.save_bundle().await.unwrap();

        let commands: Vec<String> = transport
            .requests()
            .into_iter()
            .map(|r| r.body.unwrap()["command"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            commands,
            vec![
                "set_morphology",
                "attach_parameters",
                "get_parameter",
                "is_parameter_constrained",
                "update_uniqueid",
                "get_value",
                "add_dataset",
                "remove_dataset",
                "get_datasets",
                "run_compute",
                "run_solver",
                "get_bundle",
                "load_bundle",
                "save_bundle",
            ]
        );

        let get_parameter = &transport.requests()[2];
        assert_eq!(
            get_parameter.body,
            Some(json!({"command": "get_parameter", "qualifier": "teff", "component": "primary"}))
        );
    }

    #[tokio::test]
    async fn login_authorises_both_apis() {
        let (transport, client) = client();
        transport.respond(
            HttpMethod::Post,
            "/auth/login",
            HttpResponse::json(200, &json!({"access_token": "T", "token_type": "bearer"})),
        );
        transport.respond(
            HttpMethod::Get,
            "/dash/sessions",
            HttpResponse::json(200, &json!({"sessions": []})),
        );
        client.set_session_id(SessionId::new("S"));
        ok_send(&transport, "S");

        client.login("a@b.com", "pw").await.unwrap();
        client.get_sessions().await.unwrap();
        client.get_datasets().await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].header("Authorization"), None);
        assert_eq!(requests[1].header("Authorization"), Some("Bearer T"));
        assert_eq!(requests[2].header("Authorization"), Some("Bearer T"));
    }

    #[tokio::test]
    async fn set_token_fans_out_and_clears() {
        let (_transport, client) = client();
        client.set_token(AuthToken::new("X"));
        assert_eq!(client.sessions().token().unwrap().expose(), "X");
        assert_eq!(client.phoebe().token().unwrap().expose(), "X");

        client.set_token(None);
        assert!(client.sessions().token().is_none());
        assert!(client.phoebe().token().is_none());
    }

    #[tokio::test]
    async fn configured_token_is_applied_at_construction() {
        let transport = Arc::new(RecordingTransport::new());
        let config = ClientConfig::default().with_token(AuthToken::new("CFG"));
        let client = PhoebeClient::with_transport(config, transport.clone());
        transport.respond(
            HttpMethod::Get,
            "/auth/config",
            HttpResponse::json(200, &json!({"mode": "jwt"})),
        );
        client.get_auth_config().await.unwrap();
        assert_eq!(
            transport.last_request().unwrap().header("Authorization"),
            Some("Bearer CFG")
        );
    }

    #[tokio::test]
    async fn failed_register_leaves_apis_unauthorised() {
        let (transport, client) = client();
        transport.respond(
            HttpMethod::Post,
            "/auth/register",
            HttpResponse::json(400, &json!({"detail": "Email already registered"})),
        );
        let err = client
            .register(&Registration::new("a@b.com", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.message(), "Email already registered");
        assert!(client.phoebe().token().is_none());
    }

    #[tokio::test]
    async fn start_then_end_session_tracks_active_id() {
        let (transport, client) = client();
        transport.respond(
            HttpMethod::Post,
            "/dash/start-session",
            HttpResponse::json(200, &json!({"session_id": "S"})),
        );
        transport.respond(
            HttpMethod::Post,
            "/dash/end-session/S",
            HttpResponse::json(200, &json!({"success": true})),
        );

        client.start_session(None).await.unwrap();
        assert_eq!(client.session_id().unwrap().as_str(), "S");

        let ended = client.end_session(None).await.unwrap();
        assert_eq!(ended, Some(json!({"success": true})));
        assert!(client.session_id().is_none());
    }

    #[tokio::test]
    async fn end_session_without_any_session_is_a_no_op() {
        let (transport, client) = client();
        assert_eq!(client.end_session(None).await.unwrap(), None);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn ending_another_session_keeps_the_active_one() {
        let (transport, client) = client();
        transport.respond(
            HttpMethod::Post,
            "/dash/end-session/OTHER",
            HttpResponse::json(200, &json!({"success": true})),
        );
        client.set_session_id(SessionId::new("S"));
        client.end_session(SessionId::new("OTHER")).await.unwrap();
        assert_eq!(client.session_id().unwrap().as_str(), "S");
    }

    #[tokio::test]
    async fn failed_end_keeps_session_active() {
        let (transport, client) = client();
        transport.respond(
            HttpMethod::Post,
            "/dash/end-session/S",
            HttpResponse::json(500, &json!({"detail": "worker unreachable"})),
        );
        client.set_session_id(SessionId::new("S"));
        let err = client.end_session(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Session);
        assert_eq!(client.session_id().unwrap().as_str(), "S");
    }

    #[tokio::test]
    async fn connect_with_auto_session_starts_one() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(
            HttpMethod::Post,
            "/dash/start-session",
            HttpResponse::json(200, &json!({"session_id": "AUTO"})),
        );
        let config = ClientConfig::default().with_auto_session(true);
        let client = PhoebeClient::connect_with_transport(config, transport.clone())
            .await
            .unwrap();
        assert_eq!(client.session_id().unwrap().as_str(), "AUTO");
        assert_eq!(transport.count(HttpMethod::Post, "/dash/start-session"), 1);
    }

    #[tokio::test]
    async fn server_declared_failure_returns_no_value() {
        let (transport, client) = client();
        client.set_session_id(SessionId::new("S"));
        transport.respond(
            HttpMethod::Post,
            "/send/S",
            HttpResponse::json(200, &json!({"success": false, "error": "Solver did not converge"})),
        );
        let err = client.run_solver(CommandArgs::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Command);
        assert_eq!(err.message(), "Solver did not converge");
    }
}
