//! The HTTP transport port.
//!
//! API layers build an [`HttpRequest`] and hand it to an [`HttpTransport`];
//! they never see the HTTP library. The production adapter lives in
//! `phoebe-server-api`; tests substitute a recording double.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::TransportError;

/// HTTP methods used by the PHOEBE server contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    /// Returns the method name as sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-resolved request, ready to put on the wire.
///
/// `Debug` redacts the `Authorization` header value.
#[derive(Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL, e.g. `http://localhost:8001/send/abc`.
    pub url: String,
    /// Header name/value pairs, in insertion order.
    pub headers: Vec<(String, String)>,
    /// JSON body, already normalised. `None` sends no body.
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// Returns the first header value named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case("authorization") {
                    (name.as_str(), "<redacted>")
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A raw HTTP response. The body is left unparsed so the API layer decides
/// how to interpret error bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Creates a response from a status and raw body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A response with `status` and `value` encoded as the JSON body.
    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, value.to_string())
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one HTTP exchange.
///
/// Implementations must not retry and must map every failure that produced no
/// response (connect, DNS, timeout) into a [`TransportError`]. Any response,
/// whatever its status, is returned as `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost:8001/auth/me".to_string(),
            headers: vec![("Authorization".to_string(), "Bearer T".to_string())],
            body: None,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(req.header("authorization"), Some("Bearer T"));
        assert_eq!(req.header("content-type"), None);
    }

    #[test]
    fn debug_output_redacts_bearer_token() {
        let req = HttpRequest {
            method: HttpMethod::Post,
            url: "http://localhost:8001/send/S".to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), "Bearer super-secret".to_string()),
            ],
            body: None,
            timeout: Duration::from_secs(1),
        };
        let rendered = format!("{req:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("application/json"));
    }

    #[test]
    fn success_range_is_2xx_only() {
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(302, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
    }
}
