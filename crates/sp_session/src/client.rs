//! `SecureSession`: the orchestrator.
//!
//! Owns the API client, the session store and the lifecycle cell. Every
//! privileged response is opened with the device key before anything is
//! merged. When a privileged call fails with a handshake-class error or a
//! 401, the session is cleared and the lifecycle returns to ANONYMOUS; the
//! failed response itself is never applied.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use sp_crypto::{KeyPair, PublicKey};
use sp_proto::api::{ExchangeRate, ProfileUpdate, TxStat, Wallet};
use sp_store::keypair::ensure_key_pair;
use sp_store::{DeviceIdentity, FileStore, KeyValueStore, SessionData, SessionPatch, SessionStore};

use crate::api_client::{paths, ApiClient, Credentials};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::lifecycle::{Lifecycle, SessionEvent, SessionState};
use crate::scheduler::ScheduledTask;
use crate::transport::{HttpTransport, Transport};

struct Inner {
    api: ApiClient,
    store: SessionStore,
    lifecycle: Lifecycle,
    device: DeviceIdentity,
    keys: KeyPair,
}

#[derive(Clone)]
pub struct SecureSession {
    inner: Arc<Inner>,
}

impl SecureSession {
    /// Open the on-disk state under the configured data directory and talk
    /// to the configured API over HTTPS.
    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let dir = config.resolve_data_dir()?;
        let storage = open_file_store(&dir)?;
        let transport = HttpTransport::new(config).context("building HTTP client")?;
        Self::open(storage, Arc::new(transport)).context("opening session state")
    }

    /// Load or create device identity and key pair, then the session bundle.
    pub fn open(
        storage: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        let device = DeviceIdentity::ensure(storage.as_ref())?;
        let material = ensure_key_pair(storage.as_ref())?;
        if material.generated {
            info!("new device key pair; any cached session was discarded");
        }
        let keys = material.pair.clone();
        let store = SessionStore::open(storage, device.clone(), material)?;

        let initial = if store.is_logged_in() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        };
        info!(device_id = %device.device_id, state = ?initial, "session core ready");

        Ok(Self {
            inner: Arc::new(Inner {
                api: ApiClient::new(transport),
                store,
                lifecycle: Lifecycle::new(initial),
                device,
                keys,
            }),
        })
    }

    pub fn state(&self) -> SessionState {
        self.inner.lifecycle.current()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<SessionState> {
        self.inner.lifecycle.subscribe()
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn get_user_data(&self) -> SessionData {
        self.inner.store.get_user_data()
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.inner.device
    }

    pub fn public_key(&self) -> &PublicKey {
        self.inner.keys.public()
    }

    // ── Login / logout ───────────────────────────────────────────────────────

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionData, ClientError> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ClientError::Validation("A valid email address is required".into()));
        }
        if password.is_empty() {
            return Err(ClientError::Validation("Password is required".into()));
        }
        self.inner
            .lifecycle
            .apply(SessionEvent::LoginStarted)
            .map_err(|_| ClientError::Validation("Already signed in; log out first".into()))?;

        match self.complete_login(email, password).await {
            Ok(data) => {
                self.transition(SessionEvent::LoginSucceeded);
                info!(
                    user_id = data.user.as_ref().map(|u| u.id.as_str()).unwrap_or_default(),
                    wallets = data.wallets.len(),
                    "login succeeded"
                );
                Ok(data)
            }
            Err(err) => {
                self.transition(SessionEvent::LoginFailed);
                warn!(error = %err, "login failed");
                Err(err)
            }
        }
    }

    async fn complete_login(&self, email: &str, password: &str) -> Result<SessionData, ClientError> {
        let bundle = self
            .inner
            .api
            .login(&self.inner.device, &self.inner.keys, email, password)
            .await?;
        if bundle.token.trim().is_empty() {
            return Err(ClientError::Protocol("Login response carried no authorization".into()));
        }
        self.inner.store.login(bundle)?;
        Ok(self.inner.store.get_user_data())
    }

    /// Sign out locally. Device identity and key pair are kept.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.inner.store.logout()?;
        self.transition(SessionEvent::LoggedOut);
        Ok(())
    }

    // ── Session merge ────────────────────────────────────────────────────────

    /// Merge `patch` into the session. `Ok(false)` when signed out.
    pub fn update_session(&self, patch: SessionPatch) -> Result<bool, ClientError> {
        let applied = self.inner.store.update_session(patch)?;
        if applied {
            self.transition(SessionEvent::Updated);
        }
        Ok(applied)
    }

    // ── Refresh ──────────────────────────────────────────────────────────────

    pub async fn refresh_profile(&self) -> Result<(), ClientError> {
        let (update, epoch) = self.get_sealed::<ProfileUpdate>(paths::PROFILE).await?;
        let mut patch = SessionPatch::new().user(update.user).banks(update.banks);
        if let Some(sender) = update.sender {
            patch = patch.sender(sender);
        }
        self.merge(epoch, patch)?;
        Ok(())
    }

    pub async fn refresh_wallets(&self) -> Result<(), ClientError> {
        let (wallets, epoch) = self.get_sealed::<Vec<Wallet>>(paths::WALLETS).await?;
        self.merge(epoch, SessionPatch::new().wallets(wallets))?;
        Ok(())
    }

    pub async fn refresh_tx_stats(&self) -> Result<(), ClientError> {
        let (stat, epoch) = self.get_sealed::<TxStat>(paths::TX_STATS).await?;
        self.merge(epoch, SessionPatch::new().tx_stat(stat))?;
        Ok(())
    }

    pub async fn refresh_exchange_rates(&self) -> Result<(), ClientError> {
        let (rates, epoch) = self
            .get_sealed::<Vec<ExchangeRate>>(paths::EXCHANGE_RATES)
            .await?;
        self.merge(epoch, SessionPatch::new().exchange_rate(rates))?;
        Ok(())
    }

    /// Refresh every dashboard slice concurrently. Each slice merges on its
    /// own; the first error is returned after all have settled.
    pub async fn refresh_all(&self) -> Result<(), ClientError> {
        let (profile, wallets, stats, rates) = tokio::join!(
            self.refresh_profile(),
            self.refresh_wallets(),
            self.refresh_tx_stats(),
            self.refresh_exchange_rates(),
        );
        profile.and(wallets).and(stats).and(rates)
    }

    /// Poll exchange rates every `period` while signed in. Dropping the
    /// returned handle stops the poll, including a request in flight.
    pub fn spawn_rate_refresh(&self, period: Duration) -> ScheduledTask {
        let session = self.clone();
        ScheduledTask::spawn("exchange-rate-refresh", period, move || {
            let session = session.clone();
            async move {
                if !session.state().is_authenticated() {
                    debug!("rate refresh skipped: signed out");
                    return;
                }
                if let Err(err) = session.refresh_exchange_rates().await {
                    warn!(error = %err, "rate refresh failed");
                }
            }
        })
    }

    // ── Privileged plumbing ──────────────────────────────────────────────────

    pub(crate) fn credentials(&self) -> Result<(Credentials, u64), ClientError> {
        let epoch = self.inner.lifecycle.epoch();
        let token = match (self.state(), self.inner.store.authorization()) {
            (SessionState::Authenticated, Some(token)) => token,
            _ => return Err(ClientError::Validation("Not signed in".into())),
        };
        let creds = Credentials {
            device_id: self.inner.device.device_id.clone(),
            keys: self.inner.keys.clone(),
            token,
        };
        Ok((creds, epoch))
    }

    pub(crate) async fn get_sealed<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<(T, u64), ClientError> {
        let (creds, epoch) = self.credentials()?;
        match self.inner.api.get_sealed(path, &creds).await {
            Ok(value) => Ok((value, epoch)),
            Err(err) => Err(self.fail(epoch, err)),
        }
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<u64, ClientError> {
        let (creds, epoch) = self.credentials()?;
        match self.inner.api.delete(path, &creds).await {
            Ok(()) => Ok(epoch),
            Err(err) => Err(self.fail(epoch, err)),
        }
    }

    /// Merge unless the session that issued the request has since ended.
    pub(crate) fn merge(&self, epoch: u64, patch: SessionPatch) -> Result<bool, ClientError> {
        self.merge_with(epoch, |_| patch)
    }

    pub(crate) fn merge_with<F>(&self, epoch: u64, make: F) -> Result<bool, ClientError>
    where
        F: FnOnce(&SessionData) -> SessionPatch,
    {
        if !self.is_current(epoch) {
            debug!(epoch, "stale response dropped");
            return Ok(false);
        }
        let applied = self.inner.store.update_with(make)?;
        if applied {
            self.transition(SessionEvent::Updated);
        }
        Ok(applied)
    }

    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.inner.lifecycle.epoch() == epoch && self.state().is_authenticated()
    }

    pub(crate) fn end_session(&self, event: SessionEvent) -> Result<(), ClientError> {
        self.inner.store.clear_on_revoke_self()?;
        self.transition(event);
        Ok(())
    }

    /// End the session on a fatal error, provided it is still the session
    /// the request was made under.
    fn fail(&self, epoch: u64, err: ClientError) -> ClientError {
        if !err.forces_logout() || !self.is_current(epoch) {
            return err;
        }
        warn!(error = %err, "ending session after fatal response");
        if let Err(store_err) = self.inner.store.logout() {
            error!(error = %store_err, "failed to clear session state");
        }
        if matches!(err, ClientError::SessionExpired) {
            self.transition(SessionEvent::Unauthorized);
            self.transition(SessionEvent::Cleared);
        } else {
            self.transition(SessionEvent::FatalResponse);
        }
        err
    }

    fn transition(&self, event: SessionEvent) {
        if let Err(illegal) = self.inner.lifecycle.apply(event) {
            debug!(error = %illegal, "transition ignored");
        }
    }
}

fn open_file_store(dir: &Path) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    let store = FileStore::open(dir).with_context(|| format!("opening {}", dir.display()))?;
    Ok(Arc::new(store))
}
