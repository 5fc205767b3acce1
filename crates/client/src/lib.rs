//! PHOEBE client facade.
//!
//! [`PhoebeClient`] drives a remote PHOEBE server without a local PHOEBE
//! installation. It aggregates the session/auth API and the command API from
//! `phoebe-server-api`, forwards tokens to both, tracks the active session,
//! and exposes one method per server command.
//!
//! ```no_run
//! use phoebe_client::{ClientConfig, CommandArgs, PhoebeClient};
//!
//! # async fn demo() -> Result<(), phoebe_client::ClientError> {
//! let client = PhoebeClient::new(ClientConfig::default())?;
//! client.login("astro@example.org", "hunter2").await?;
//!
//! let period = client
//!     .with_session(|c| async move {
//!         let filter = CommandArgs::new()
//!             .with("qualifier", "period")?
//!             .with("component", "binary")?;
//!         c.set_value(1.5, filter.clone()).await?;
//!         c.get_value(filter).await
//!     })
//!     .await?;
//! println!("{period}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architectural Layer
//!
//! **Facade.** No method computes or validates beyond required-field checks;
//! the server owns command semantics.

pub mod client;
pub mod config;
pub mod scoped;

pub use client::PhoebeClient;
pub use config::ClientConfig;
pub use scoped::ScopedSession;

// Re-export the types callers need so they can depend on this crate alone.
pub use phoebe_protocol::{
    AuthConfig, AuthMode, AuthToken, ClientError, CommandArgs, ErrorKind, NumericArray,
    Registration, SessionDescriptor, SessionId, TokenResponse, UserInfo, DEFAULT_HOST,
    DEFAULT_PORT, DEFAULT_TIMEOUT_SECS,
};
pub use phoebe_server_api::{ConnectionSettings, ReqwestTransport};
