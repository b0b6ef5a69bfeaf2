//! Session lifecycle.
//!
//! ```text
//! ANONYMOUS --login--> AUTHENTICATING --ok--> AUTHENTICATED --(update)--> AUTHENTICATED
//!     ^                      |                   |   |
//!     +------ failure -------+                   |   +--401--> EXPIRED --cleared--> ANONYMOUS
//!     +------ logout / revoke(self) / fatal -----+
//! ```
//!
//! Device identity and key pair are untouched by every edge.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoginStarted,
    LoginSucceeded,
    LoginFailed,
    Updated,
    LoggedOut,
    RevokedSelf,
    /// Missing handshake or failed decryption on an authenticated call.
    FatalResponse,
    /// HTTP 401.
    Unauthorized,
    /// Local state wiped after expiry.
    Cleared,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("illegal session transition: {event:?} while {from:?}")]
pub struct IllegalTransition {
    pub from: SessionState,
    pub event: SessionEvent,
}

impl SessionState {
    pub fn next(self, event: SessionEvent) -> Result<SessionState, IllegalTransition> {
        use SessionEvent::*;
        use SessionState::*;

        let to = match (self, event) {
            (Anonymous, LoginStarted) => Authenticating,
            (Authenticating, LoginSucceeded) => Authenticated,
            (Authenticating, LoginFailed) => Anonymous,
            (Authenticated, Updated) => Authenticated,
            (Authenticated, Unauthorized) => Expired,
            (Authenticated, LoggedOut | RevokedSelf | FatalResponse) => Anonymous,
            (Expired, Cleared | LoggedOut) => Anonymous,
            // logging out twice is harmless
            (Anonymous, LoggedOut) => Anonymous,
            (from, event) => return Err(IllegalTransition { from, event }),
        };
        Ok(to)
    }

    pub fn is_authenticated(self) -> bool {
        self == SessionState::Authenticated
    }
}

/// Shared lifecycle cell. Observers subscribe through a `watch` channel.
///
/// `epoch` increases on every successful login so work started under one
/// session can tell it has been superseded.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<SessionState>,
    epoch: AtomicU64,
}

impl Lifecycle {
    pub fn new(initial: SessionState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Apply `event` atomically. Observers are only notified on change.
    pub fn apply(&self, event: SessionEvent) -> Result<SessionState, IllegalTransition> {
        let mut outcome = Err(IllegalTransition {
            from: self.current(),
            event,
        });
        self.state.send_if_modified(|state| {
            outcome = state.next(event);
            match outcome {
                Ok(to) => {
                    if event == SessionEvent::LoginSucceeded {
                        self.epoch.fetch_add(1, Ordering::SeqCst);
                    }
                    let changed = *state != to;
                    if changed {
                        debug!(from = ?*state, to = ?to, ?event, "session transition");
                    }
                    *state = to;
                    changed
                }
                Err(_) => false,
            }
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionEvent::*;
    use SessionState::*;

    #[test]
    fn login_path() {
        assert_eq!(Anonymous.next(LoginStarted), Ok(Authenticating));
        assert_eq!(Authenticating.next(LoginSucceeded), Ok(Authenticated));
        assert_eq!(Authenticating.next(LoginFailed), Ok(Anonymous));
        assert_eq!(Authenticated.next(Updated), Ok(Authenticated));
    }

    #[test]
    fn every_exit_from_authenticated_lands_anonymous() {
        for event in [LoggedOut, RevokedSelf, FatalResponse] {
            assert_eq!(Authenticated.next(event), Ok(Anonymous));
        }
        let expired = Authenticated.next(Unauthorized).unwrap();
        assert_eq!(expired, Expired);
        assert_eq!(expired.next(Cleared), Ok(Anonymous));
    }

    #[test]
    fn illegal_edges_are_rejected() {
        assert!(Authenticated.next(LoginStarted).is_err());
        assert!(Authenticating.next(LoginStarted).is_err());
        assert!(Anonymous.next(Updated).is_err());
        assert!(Anonymous.next(LoginSucceeded).is_err());
        assert!(Expired.next(Updated).is_err());
    }

    #[test]
    fn cell_bumps_epoch_per_login_and_notifies() {
        let cell = Lifecycle::new(Anonymous);
        let mut rx = cell.subscribe();
        assert_eq!(cell.epoch(), 0);

        cell.apply(LoginStarted).unwrap();
        cell.apply(LoginSucceeded).unwrap();
        assert_eq!(cell.epoch(), 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Authenticated);

        cell.apply(Updated).unwrap();
        assert!(!rx.has_changed().unwrap());

        assert!(cell.apply(LoginStarted).is_err());
        assert_eq!(cell.current(), Authenticated);

        cell.apply(LoggedOut).unwrap();
        cell.apply(LoginStarted).unwrap();
        cell.apply(LoginSucceeded).unwrap();
        assert_eq!(cell.epoch(), 2);
    }
}
