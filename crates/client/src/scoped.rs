//! Scoped sessions: a server session that is always released.
//!
//! Every server session pins a worker process and its memory until it is
//! ended. [`PhoebeClient::with_session`] and [`ScopedSession`] guarantee the
//! end call is made on every exit path: normal return, `?` early return, a
//! failed body, a panic, or the enclosing future being dropped.

use std::future::Future;
use std::ops::Deref;

use phoebe_protocol::{ClientError, SessionId};
use tracing::{info, warn};

use crate::PhoebeClient;

/// Guard over the client's active session.
///
/// Prefer [`ScopedSession::close`], which reports whether the server accepted
/// the end call. Dropping the guard without closing it ends the session in a
/// background task on the current tokio runtime.
#[must_use = "dropping a ScopedSession immediately ends the session"]
#[derive(Debug)]
pub struct ScopedSession {
    client: PhoebeClient,
    closed: bool,
}

impl ScopedSession {
    /// The client whose session this guard owns.
    pub fn client(&self) -> &PhoebeClient {
        &self.client
    }

    /// Ends whichever session is active on the client.
    ///
    /// The active session is cleared locally even when the server rejects the
    /// end call; the scope is over either way.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.closed = true;
        let Some(session_id) = self.client.session_id() else {
            return Ok(());
        };
        self.client.phoebe.set_session_id(None);
        self.client
            .sessions
            .end_session(&session_id)
            .await
            .map(|_| ())
    }
}

impl Deref for ScopedSession {
    type Target = PhoebeClient;

    fn deref(&self) -> &PhoebeClient {
        &self.client
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Some(session_id) = self.client.session_id() else {
            return;
        };
        self.client.phoebe.set_session_id(None);
        end_in_background(&self.client, session_id);
    }
}

fn end_in_background(client: &PhoebeClient, session_id: SessionId) {
    let sessions = std::sync::Arc::clone(&client.sessions);
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            info!(%session_id, "scope exited without close; ending session in background");
            handle.spawn(async move {
                if let Err(e) = sessions.end_session(&session_id).await {
                    warn!(%session_id, error = %e, "background end-session failed");
                }
            });
        }
        Err(_) => {
            warn!(%session_id, "no tokio runtime available; server session left open");
        }
    }
}

impl PhoebeClient {
    /// Starts a session if none is active and returns a guard that ends the
    /// active session when closed or dropped.
    pub async fn scoped_session(&self) -> Result<ScopedSession, ClientError> {
        if self.session_id().is_none() {
            self.start_session(None).await?;
        }
        Ok(ScopedSession {
            client: self.clone(),
            closed: false,
        })
    }

    /// Runs `body` inside a session and ends that session afterwards.
    ///
    /// A session is started only if none is active. Exactly one end call is
    /// made when `body` finishes, whether it succeeds or fails. If both `body`
    /// and the end call fail, the body's error is returned and the end failure
    /// is logged.
    pub async fn with_session<F, Fut, T, E>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(PhoebeClient) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ClientError>,
    {
        let scope = self.scoped_session().await?;
        let outcome = body(self.clone()).await;
        let closed = scope.close().await;

        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err.into()),
            (Err(body_err), Ok(())) => Err(body_err),
            (Err(body_err), Err(close_err)) => {
                warn!(error = %close_err, "ending session after a failed scope also failed");
                Err(body_err)
            }
        }
    }
}
