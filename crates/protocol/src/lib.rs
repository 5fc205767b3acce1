//! Shared domain for the PHOEBE client.
//!
//! This crate contains the identifiers, wire types, error kinds, and the
//! transport port used by every other crate in the workspace. Transport
//! adapters implement the trait defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Domain + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is sent and received; `phoebe-server-api` defines *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`SessionId`, `CommandName`, `AuthToken`) |
//! | [`types`] | Session and authentication payloads |
//! | [`command`] | Command envelopes, argument maps, numeric-array normalisation |
//! | [`transport`] | The [`HttpTransport`] port and its request/response types |
//! | [`errors`] | [`ClientError`] and its kinds |

pub mod command;
pub mod errors;
pub mod identifiers;
pub mod transport;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use command::{to_json_value, CommandArgs, CommandEnvelope, NumericArray, COMMAND_KEY};
pub use errors::{ClientError, ErrorKind, TransportError};
pub use identifiers::{AuthToken, CommandName, SessionId};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
pub use types::{
    AuthConfig, AuthMode, Credentials, Registration, SessionDescriptor, TokenResponse, UserInfo,
};

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8001;

/// Default request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
