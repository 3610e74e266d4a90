//! Session lifecycle for the upstream source.
//!
//! The manager owns the authenticated flag; nothing else in the process may
//! flip it. `ensure_authenticated` restores a persisted session when it can
//! and falls back to a fresh login, `invalidate` forces the next cycle to
//! re-authenticate.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::store::FileSessionStore;

use super::{Credentials, Post, SessionCookie, SourceClient, SourceError};

pub struct SessionManager {
    client: Arc<dyn SourceClient>,
    store: FileSessionStore,
    credentials: Credentials,
    session: Option<Vec<SessionCookie>>,
    authenticated: bool,
}

impl SessionManager {
    pub fn new(
        client: Arc<dyn SourceClient>,
        store: FileSessionStore,
        credentials: Credentials,
    ) -> Self {
        Self {
            client,
            store,
            credentials,
            session: None,
            authenticated: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Force re-authentication on the next `ensure_authenticated` call.
    ///
    /// Called after a failed cycle so a dead session is not retried
    /// indefinitely.
    pub fn invalidate(&mut self) {
        self.authenticated = false;
    }

    /// Make sure there is a session the source accepts.
    ///
    /// Restores the persisted session and probes it first; a stale or absent
    /// session triggers a fresh login, whose result is persisted (save
    /// failure only means a re-login on the next process start).
    pub async fn ensure_authenticated(&mut self) -> Result<(), SourceError> {
        if self.authenticated {
            return Ok(());
        }

        if self.session.is_none() {
            self.session = self.store.load().await;
        }

        if let Some(session) = &self.session {
            match self.client.is_authenticated(session).await {
                Ok(true) => {
                    debug!("restored session is still valid");
                    self.authenticated = true;
                    return Ok(());
                }
                Ok(false) => info!("restored session is stale, logging in again"),
                Err(e) => warn!(error = %e, "session probe failed, logging in again"),
            }
        }

        info!("logging in to source");
        let session = self.client.login(&self.credentials).await?;
        if let Err(e) = self.store.save(&session).await {
            warn!(error = %e, "failed to persist session, next start will re-login");
        }
        self.session = Some(session);
        self.authenticated = true;
        Ok(())
    }

    /// Fetch the latest posts of `account`.
    ///
    /// Requires a prior successful `ensure_authenticated`; the polling loop
    /// enforces that ordering.
    pub async fn fetch_latest(
        &mut self,
        account: &str,
        count: usize,
    ) -> Result<Vec<Post>, SourceError> {
        if !self.authenticated {
            return Err(SourceError::NotAuthenticated);
        }
        let session = self.session.as_deref().ok_or(SourceError::NotAuthenticated)?;
        self.client.fetch_latest(session, account, count).await
    }
}
