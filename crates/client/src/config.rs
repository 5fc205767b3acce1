//! Connection configuration for [`crate::PhoebeClient`].
//!
//! All parameters are supplied by the caller; there is no config file. The
//! environment is consulted only when the caller asks for it through
//! [`ClientConfig::from_env`].

use std::time::Duration;

use phoebe_protocol::{AuthToken, ClientError};
use phoebe_server_api::ConnectionSettings;

/// Overrides the server host.
pub const ENV_HOST: &str = "PHOEBE_HOST";
/// Overrides the server port.
pub const ENV_PORT: &str = "PHOEBE_PORT";
/// Overrides the request timeout, in whole seconds.
pub const ENV_TIMEOUT_SECS: &str = "PHOEBE_TIMEOUT_SECS";
/// Bearer token applied at construction.
pub const ENV_TOKEN: &str = "PHOEBE_TOKEN";

/// Settings used to construct a [`crate::PhoebeClient`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientConfig {
    /// Host, port and request timeout.
    pub connection: ConnectionSettings,
    /// Token applied to both APIs at construction.
    pub token: Option<AuthToken>,
    /// Start a session as soon as the client connects.
    pub auto_session: bool,
}

impl ClientConfig {
    /// Sets the server host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.connection.host = host.into();
        self
    }

    /// Sets the server port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.connection.port = port;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connection.timeout = timeout;
        self
    }

    /// Sets or clears the initial bearer token.
    pub fn with_token(mut self, token: Option<AuthToken>) -> Self {
        self.token = token;
        self
    }

    /// Starts a session on [`crate::PhoebeClient::connect`] when `true`.
    pub fn with_auto_session(mut self, auto_session: bool) -> Self {
        self.auto_session = auto_session;
        self
    }

    /// Defaults overridden by `PHOEBE_HOST`, `PHOEBE_PORT`,
    /// `PHOEBE_TIMEOUT_SECS` and `PHOEBE_TOKEN` when set.
    ///
    /// # Errors
    ///
    /// [`ClientError::Parameter`] when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ClientConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let mut config = Self::default();

        if let Some(host) = lookup(ENV_HOST).filter(|h| !h.is_empty()) {
            config.connection.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.connection.port = port
                .trim()
                .parse()
                .map_err(|_| ClientError::parameter(format!("{ENV_PORT} is not a valid port: {port:?}")))?;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ClientError::parameter(format!("{ENV_TIMEOUT_SECS} is not a whole number of seconds: {secs:?}"))
            })?;
            config.connection.timeout = Duration::from_secs(secs);
        }
        config.token = lookup(ENV_TOKEN).and_then(AuthToken::new);

        Ok(config)
    }
}
