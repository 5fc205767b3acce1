//! Connection plumbing shared by [`crate::SessionApi`] and [`crate::PhoebeApi`].
//!
//! [`BaseApi`] owns the server address, the timeout, the optional bearer token
//! and the [`HttpTransport`]. It turns a method/path/body triple into one HTTP
//! exchange and maps every failure onto the [`ErrorKind`] chosen by the caller.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use phoebe_protocol::{
    AuthToken, ClientError, ErrorKind, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS,
};
use serde_json::Value;
use tracing::{debug, warn};

/// Fields inspected, in order, for a server-supplied error message.
const MESSAGE_FIELDS: [&str; 3] = ["detail", "error", "message"];

// ---------------------------------------------------------------------------
// Connection settings
// ---------------------------------------------------------------------------

/// Where and how patiently to talk to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    /// Applied to every request; there is no retry.
    pub timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ConnectionSettings {
    /// `http://{host}:{port}`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// BaseApi
// ---------------------------------------------------------------------------

/// Shared request execution for the server API clients.
pub struct BaseApi {
    transport: Arc<dyn HttpTransport>,
    settings: ConnectionSettings,
    token: RwLock<Option<AuthToken>>,
}

impl BaseApi {
    /// Creates an unauthenticated client for `settings` over `transport`.
    pub fn new(transport: Arc<dyn HttpTransport>, settings: ConnectionSettings) -> Self {
        Self {
            transport,
            settings,
            token: RwLock::new(None),
        }
    }

    /// Host, port and timeout in use.
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// `http://{host}:{port}` for the configured server.
    pub fn base_url(&self) -> String {
        self.settings.base_url()
    }

    /// Sets or clears the bearer token sent with every subsequent request.
    pub fn set_token(&self, token: Option<AuthToken>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Returns the bearer token currently attached to requests.
    pub fn token(&self) -> Option<AuthToken> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(token) = self.token() {
            headers.push(("Authorization".to_string(), token.bearer_header()));
        }
        headers
    }

    /// Builds the request for `path` without sending it.
    pub fn build_request(&self, method: HttpMethod, path: &str, body: Option<Value>) -> HttpRequest {
        HttpRequest {
            method,
            url: format!("{}{}", self.base_url(), path),
            headers: self.headers(),
            body,
            timeout: self.settings.timeout,
        }
    }

    /// Sends one request and returns the parsed JSON body of a 2xx response.
    ///
    /// # Errors
    ///
    /// An error of `kind` for a transport failure, a non-2xx status, or a
    /// 2xx body that is not valid JSON.
    pub async fn request(
        &self,
        kind: ErrorKind,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.exchange(kind, method, path, body)
            .await
            .map(|(_, value)| value)
    }

    /// Like [`BaseApi::request`] but also returns the HTTP status.
    pub async fn exchange(
        &self,
        kind: ErrorKind,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<(u16, Value), ClientError> {
        let request = self.build_request(method, path, body);
        debug!(%method, path, authorized = request.header("Authorization").is_some(), "sending request");

        let response = self.transport.send(request).await.map_err(|e| {
            warn!(%method, path, error = %e, timeout = e.timeout, "request failed before a response");
            ClientError::from_transport(kind, e)
        })?;
        debug!(%method, path, status = response.status, "received response");

        if !response.is_success() {
            let message = error_message(&response);
            warn!(%method, path, status = response.status, %message, "server returned an error status");
            return Err(ClientError::from_status(kind, response.status, message));
        }

        let value = parse_body(&response.body).map_err(|e| {
            ClientError::from_status(
                kind,
                response.status,
                format!("server returned invalid JSON: {e}"),
            )
        })?;
        Ok((response.status, value))
    }
}

impl std::fmt::Debug for BaseApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseApi")
            .field("settings", &self.settings)
            .field("token", &self.token())
            .finish_non_exhaustive()
    }
}

/// Appends `segment` to `path` as one percent-encoded path segment.
///
/// `/`, `?`, `#` and `%` in `segment` are escaped, so a caller-supplied id can
/// never address a different endpoint.
///
/// # Errors
///
/// [`ClientError::Parameter`] when `segment` is `.` or `..`.
pub fn segment_path(path: &str, segment: &str) -> Result<String, ClientError> {
    if matches!(segment, "." | "..") {
        return Err(ClientError::parameter(format!(
            "{segment:?} is not a valid path segment"
        )));
    }
    let mut url = reqwest::Url::parse(&format!("http://localhost{path}"))
        .map_err(|e| ClientError::parameter(format!("invalid request path {path:?}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ClientError::parameter(format!("invalid request path {path:?}")))?
        .push(segment);
    Ok(url.path().to_string())
}

// ---------------------------------------------------------------------------
// Response interpretation
// ---------------------------------------------------------------------------

fn parse_body(body: &str) -> Result<Value, serde_json::Error> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
}

/// Extracts the first server-supplied message field from a JSON object.
///
/// String fields are returned as-is; structured ones (e.g. a validation error
/// list under `detail`) are returned as compact JSON.
pub fn server_message(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    MESSAGE_FIELDS.iter().find_map(|field| match object.get(*field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(Value::String(_)) => None,
        Some(other) => Some(other.to_string()),
    })
}

/// Returns the failure message when `value` declares `"success": false`.
pub fn declared_failure(value: &Value) -> Option<String> {
    match value.get("success") {
        Some(Value::Bool(false)) => {
            Some(server_message(value).unwrap_or_else(|| "server reported failure".to_string()))
        }
        _ => None,
    }
}

fn error_message(response: &HttpResponse) -> String {
    let detail = match serde_json::from_str::<Value>(&response.body) {
        Ok(value) => server_message(&value).or_else(|| non_empty(&response.body)),
        Err(_) => non_empty(&response.body),
    };

    if matches!(response.status, 401 | 403) {
        let prefix = format!("Server authentication failed (status {})", response.status);
        return match detail {
            Some(detail) => format!("{prefix}: {detail}"),
            None => format!("{prefix}."),
        };
    }

    detail.unwrap_or_else(|| {
        let reason = reqwest::StatusCode::from_u16(response.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown status");
        format!("HTTP {} {}", response.status, reason)
    })
}

fn non_empty(body: &str) -> Option<String> {
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
