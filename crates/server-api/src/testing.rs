//! In-memory [`HttpTransport`] double for tests.
//!
//! [`RecordingTransport`] records every request it receives and answers from
//! responses scripted per method and path. Unscripted routes get a 404 so a
//! test never silently talks to an endpoint it did not expect.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use phoebe_protocol::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

type Scripted = Result<HttpResponse, TransportError>;

struct Route {
    method: HttpMethod,
    path: String,
    replies: VecDeque<Scripted>,
}

/// Records requests and replays scripted responses.
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<HttpRequest>>,
    routes: Mutex<Vec<Route>>,
}

impl RecordingTransport {
    /// Creates a transport with no scripted routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `response` for `method path`.
    ///
    /// Queued replies are consumed in order; the last one is repeated for any
    /// further requests to the same route.
    pub fn respond(&self, method: HttpMethod, path: &str, response: HttpResponse) {
        self.script(method, path, Ok(response));
    }

    /// Queues a transport failure for `method path`.
    pub fn fail(&self, method: HttpMethod, path: &str, error: TransportError) {
        self.script(method, path, Err(error));
    }

    fn script(&self, method: HttpMethod, path: &str, reply: Scripted) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        match routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                replies: VecDeque::from([reply]),
            }),
        }
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests received for `method path`.
    pub fn requests_to(&self, method: HttpMethod, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && request_path(&r.url) == path)
            .collect()
    }

    /// Number of requests received for `method path`.
    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = request.method;
        let path = request_path(&request.url).to_string();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let route = routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path);
        match route {
            Some(route) if route.replies.len() > 1 => route
                .replies
                .pop_front()
                .unwrap_or_else(|| Ok(not_found())),
            Some(route) => route.replies.front().cloned().unwrap_or_else(|| Ok(not_found())),
            None => Ok(not_found()),
        }
    }
}

fn not_found() -> HttpResponse {
    HttpResponse::new(404, r#"{"detail":"Not Found"}"#)
}

/// Strips scheme and authority from an absolute URL.
pub fn request_path(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .find('/')
        .map_or("/", |i| &without_scheme[i..])
}
