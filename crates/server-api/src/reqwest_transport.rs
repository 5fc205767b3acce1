//! [`HttpTransport`] adapter over `reqwest`.

use async_trait::async_trait;
use phoebe_protocol::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Production transport. One instance holds one connection pool; clone the
/// `Arc` rather than building a new transport per request.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with a default `reqwest` client.
    ///
    /// # Errors
    ///
    /// [`TransportError`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().build().map_err(map_error)?;
        Ok(Self { client })
    }

    /// Wraps an existing client (custom proxies, root certificates, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        }
        .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| TransportError::new(format!("failed to encode request body: {e}")))?;
            builder = builder.body(bytes);
        }

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_error)?;
        Ok(HttpResponse { status, body })
    }
}

fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::timed_out(err.to_string())
    } else {
        TransportError::new(err.to_string())
    }
}
