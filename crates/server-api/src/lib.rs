//! PHOEBE server API clients.
//!
//! Consolidates all HTTP communication with the PHOEBE server:
//!
//! - [`BaseApi`]: shared plumbing: host/port/timeout, base URL, bearer token,
//!   request execution and error mapping.
//! - [`SessionApi`]: session lifecycle (`/dash/...`) and authentication
//!   (`/auth/...`).
//! - [`PhoebeApi`]: domain command execution via `POST /send/{session_id}`.
//! - [`ReqwestTransport`]: the production [`phoebe_protocol::HttpTransport`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** URL construction, header injection, status mapping and
//! response parsing live here. Callers see only typed results and
//! [`phoebe_protocol::ClientError`].

pub mod base;
pub mod phoebe;
pub mod reqwest_transport;
pub mod session;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use base::{BaseApi, ConnectionSettings};
pub use phoebe::PhoebeApi;
pub use reqwest_transport::ReqwestTransport;
pub use session::SessionApi;
