//! The server's view of this device's session, and of the others.
//!
//! Revoking the current session signs this client out. Revoking any other
//! session only drops it from `other_sessions`. A revocation that fails
//! changes nothing locally and can be retried.

use tracing::info;

use sp_proto::api::{SessionList, SessionRecord};
use sp_store::SessionPatch;

use crate::api_client::paths;
use crate::client::SecureSession;
use crate::error::ClientError;
use crate::lifecycle::SessionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// The current session was revoked; the client is now signed out.
    SignedOut,
    /// Another session was revoked and removed from the local list.
    Removed,
}

#[derive(Clone)]
pub struct LocalSessionCodec {
    session: SecureSession,
}

impl LocalSessionCodec {
    pub fn new(session: SecureSession) -> Self {
        Self { session }
    }

    /// Fetch and decrypt the descriptor of the current session, and keep it
    /// for display.
    pub async fn decode(&self) -> Result<SessionRecord, ClientError> {
        let (record, epoch) = self.fetch_current().await?;
        if self.session.is_current(epoch) {
            self.session.store().set_current_session(&record)?;
        }
        Ok(record)
    }

    async fn fetch_current(&self) -> Result<(SessionRecord, u64), ClientError> {
        self.session.get_sealed(paths::CURRENT_SESSION).await
    }

    /// Fetch every session of the account. The current one is stored as
    /// the current-session descriptor, the rest replace `other_sessions`.
    pub async fn list(&self) -> Result<SessionList, ClientError> {
        let (list, epoch): (SessionList, u64) = self.session.get_sealed(paths::SESSIONS).await?;
        if self.session.is_current(epoch) {
            self.session.store().set_current_session(&list.current)?;
            self.session
                .merge(epoch, SessionPatch::new().other_sessions(list.others.clone()))?;
        }
        Ok(list)
    }

    pub async fn revoke(&self, session_id: &str) -> Result<RevokeOutcome, ClientError> {
        let session_id = session_id.trim();
        validate_session_id(session_id)?;

        // Not cached here; revoke only writes once the server has acknowledged.
        let current = match self.session.store().current_session()? {
            Some(record) => record,
            None => self.fetch_current().await?.0,
        };

        let epoch = self.session.delete(&paths::session(session_id)).await?;

        if session_id == current.id {
            info!("current session revoked; signing out");
            if self.session.is_current(epoch) {
                self.session.end_session(SessionEvent::RevokedSelf)?;
            }
            return Ok(RevokeOutcome::SignedOut);
        }

        self.session.merge_with(epoch, |data| {
            let others = data
                .other_sessions
                .iter()
                .filter(|s| s.id != session_id)
                .cloned()
                .collect();
            SessionPatch::new().other_sessions(others)
        })?;
        info!(session_id, "session revoked");
        Ok(RevokeOutcome::Removed)
    }
}

fn validate_session_id(id: &str) -> Result<(), ClientError> {
    if id.is_empty() {
        return Err(ClientError::Validation("Session id is required".into()));
    }
    let path_safe = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    // Dot segments and the `current` route would address another endpoint.
    let reserved = id.chars().all(|c| c == '.') || id.eq_ignore_ascii_case("current");
    if !path_safe || reserved {
        return Err(ClientError::Validation(format!("Invalid session id: {id}")));
    }
    Ok(())
}
