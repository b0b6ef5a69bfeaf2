//! Durable session bundle.
//!
//! `SessionStore` is a cloneable handle over one in-memory snapshot backed by
//! a `KeyValueStore`. Writers compute the next snapshot, persist it, then
//! publish it, all under the write lock: a failed write leaves the published
//! snapshot untouched, and concurrent merges never lose each other's fields.
//!
//! Invariant: `authorization` and `is_logged_in` change together, only
//! through `login` / `logout` / `clear_on_revoke_self`. `SessionPatch` has
//! no way to name them.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sp_crypto::KeyPair;
use sp_proto::api::{
    Bank, ExchangeRate, ProfileBundle, Sender, SessionRecord, Transaction, TxStat, User, Wallet,
};

use crate::device::DeviceIdentity;
use crate::error::StoreError;
use crate::keypair::KeyMaterial;
use crate::storage::{load_json, save_json, slots, KeyValueStore};

// ── Snapshot ─────────────────────────────────────────────────────────────────

/// The persisted bundle. `client`, `device_id` and `device_name` are
/// rehydrated from their own records on open and never written here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionData {
    authorization: String,
    is_logged_in: bool,
    #[serde(skip)]
    pub client: Option<KeyPair>,
    #[serde(skip)]
    pub device_id: String,
    #[serde(skip)]
    pub device_name: String,
    pub user: Option<User>,
    pub wallets: Vec<Wallet>,
    pub transactions: Vec<Transaction>,
    pub sender: Option<Sender>,
    pub banks: Vec<Bank>,
    pub other_sessions: Vec<SessionRecord>,
    pub exchange_rate: Vec<ExchangeRate>,
    pub tx_stat: TxStat,
}

impl SessionData {
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in
    }

    /// Signed-out snapshot that keeps this one's device identity and keys.
    fn cleared(&self) -> Self {
        Self {
            client: self.client.clone(),
            device_id: self.device_id.clone(),
            device_name: self.device_name.clone(),
            ..Self::default()
        }
    }

    fn is_consistent(&self) -> bool {
        self.is_logged_in == !self.authorization.is_empty()
    }
}

impl PartialEq for SessionData {
    fn eq(&self, other: &Self) -> bool {
        self.authorization == other.authorization
            && self.is_logged_in == other.is_logged_in
            && self.client.as_ref().map(|k| *k.public()) == other.client.as_ref().map(|k| *k.public())
            && self.device_id == other.device_id
            && self.device_name == other.device_name
            && self.user == other.user
            && self.wallets == other.wallets
            && self.transactions == other.transactions
            && self.sender == other.sender
            && self.banks == other.banks
            && self.other_sessions == other.other_sessions
            && self.exchange_rate == other.exchange_rate
            && self.tx_stat == other.tx_stat
    }
}

// ── Partial update ───────────────────────────────────────────────────────────

/// A partial update of the profile slices.
///
/// Merge policy, per field: present (`Some`) replaces the stored value,
/// absent (`None`) retains it. Lists are replaced whole, never appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallets: Option<Vec<Wallet>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<Transaction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banks: Option<Vec<Bank>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_sessions: Option<Vec<SessionRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<Vec<ExchangeRate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_stat: Option<TxStat>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn wallets(mut self, wallets: Vec<Wallet>) -> Self {
        self.wallets = Some(wallets);
        self
    }

    pub fn transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.transactions = Some(transactions);
        self
    }

    pub fn sender(mut self, sender: Sender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn banks(mut self, banks: Vec<Bank>) -> Self {
        self.banks = Some(banks);
        self
    }

    pub fn other_sessions(mut self, sessions: Vec<SessionRecord>) -> Self {
        self.other_sessions = Some(sessions);
        self
    }

    pub fn exchange_rate(mut self, rates: Vec<ExchangeRate>) -> Self {
        self.exchange_rate = Some(rates);
        self
    }

    pub fn tx_stat(mut self, stat: TxStat) -> Self {
        self.tx_stat = Some(stat);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Reducer: fold this patch into `base`.
    pub fn apply(self, mut base: SessionData) -> SessionData {
        if let Some(v) = self.user {
            base.user = Some(v);
        }
        if let Some(v) = self.wallets {
            base.wallets = v;
        }
        if let Some(v) = self.transactions {
            base.transactions = v;
        }
        if let Some(v) = self.sender {
            base.sender = Some(v);
        }
        if let Some(v) = self.banks {
            base.banks = v;
        }
        if let Some(v) = self.other_sessions {
            base.other_sessions = v;
        }
        if let Some(v) = self.exchange_rate {
            base.exchange_rate = v;
        }
        if let Some(v) = self.tx_stat {
            base.tx_stat = v;
        }
        base
    }
}

// ── Store ────────────────────────────────────────────────────────────────────

struct Inner {
    storage: Arc<dyn KeyValueStore>,
    snapshot: RwLock<SessionData>,
}

/// Cheap to clone; all clones share one snapshot.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Load the persisted bundle and attach device identity and keys.
    ///
    /// A freshly generated key pair invalidates everything cached under the
    /// old one, so the bundle and current-session record are discarded.
    pub fn open(
        storage: Arc<dyn KeyValueStore>,
        device: DeviceIdentity,
        keys: KeyMaterial,
    ) -> Result<Self, StoreError> {
        let mut data = if keys.generated {
            storage.remove(slots::SESSION_BUNDLE)?;
            storage.remove(slots::SESSION_CURRENT)?;
            SessionData::default()
        } else {
            match load_json::<SessionData>(storage.as_ref(), slots::SESSION_BUNDLE) {
                Ok(Some(data)) if data.is_consistent() => data,
                Ok(Some(_)) => {
                    warn!("session bundle has authorization without login flag; discarding");
                    discard_bundle(storage.as_ref())?;
                    SessionData::default()
                }
                Ok(None) => SessionData::default(),
                Err(StoreError::CorruptRecord { reason, .. }) => {
                    warn!(%reason, "session bundle unreadable; discarding");
                    discard_bundle(storage.as_ref())?;
                    SessionData::default()
                }
                Err(e) => return Err(e),
            }
        };

        data.client = Some(keys.pair);
        data.device_id = device.device_id;
        data.device_name = device.device_name;

        debug!(logged_in = data.is_logged_in, "session store opened");
        Ok(Self {
            inner: Arc::new(Inner {
                storage,
                snapshot: RwLock::new(data),
            }),
        })
    }

    /// Current snapshot. Memory only.
    pub fn get_user_data(&self) -> SessionData {
        self.inner.snapshot.read().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.snapshot.read().is_logged_in
    }

    /// Bearer token, if signed in.
    pub fn authorization(&self) -> Option<String> {
        let snap = self.inner.snapshot.read();
        snap.is_logged_in.then(|| snap.authorization.clone())
    }

    pub fn key_pair(&self) -> Option<KeyPair> {
        self.inner.snapshot.read().client.clone()
    }

    pub fn device_identity(&self) -> DeviceIdentity {
        let snap = self.inner.snapshot.read();
        DeviceIdentity {
            device_id: snap.device_id.clone(),
            device_name: snap.device_name.clone(),
        }
    }

    /// Install a fresh login: token, login flag and full profile together.
    pub fn login(&self, bundle: ProfileBundle) -> Result<(), StoreError> {
        if bundle.token.trim().is_empty() {
            return Err(StoreError::InvalidSession(
                "login bundle has an empty authorization token".into(),
            ));
        }
        self.commit(|current| {
            let mut next = current.cleared();
            next.authorization = bundle.token;
            next.is_logged_in = true;
            next.user = Some(bundle.user);
            next.wallets = bundle.wallets;
            next.transactions = bundle.transactions;
            next.sender = bundle.sender;
            next.banks = bundle.banks;
            next.other_sessions = bundle.other_sessions;
            next.exchange_rate = bundle.exchange_rate;
            next.tx_stat = bundle.tx_stat;
            Some(next)
        })?;
        info!("session established");
        Ok(())
    }

    /// Merge `patch` into the snapshot. Returns `false` when the patch was
    /// discarded because nobody is signed in.
    pub fn update_session(&self, patch: SessionPatch) -> Result<bool, StoreError> {
        if patch.is_empty() {
            return Ok(self.is_logged_in());
        }
        let applied = self.commit(|current| {
            if !current.is_logged_in {
                return None;
            }
            Some(patch.apply(current.clone()))
        })?;
        if !applied {
            debug!("session patch discarded: signed out");
        }
        Ok(applied)
    }

    /// Like `update_session`, but the patch is computed from the snapshot it
    /// will be applied to, under the same write lock.
    pub fn update_with<F>(&self, make: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&SessionData) -> SessionPatch,
    {
        self.commit(|current| {
            current
                .is_logged_in
                .then(|| make(current).apply(current.clone()))
        })
    }

    pub fn logout(&self) -> Result<(), StoreError> {
        self.clear("logout")
    }

    pub fn clear_on_revoke_self(&self) -> Result<(), StoreError> {
        self.clear("revoked")
    }

    /// Decoded descriptor of the current session, if one has been fetched.
    pub fn current_session(&self) -> Result<Option<SessionRecord>, StoreError> {
        match load_json(self.inner.storage.as_ref(), slots::SESSION_CURRENT) {
            Err(StoreError::CorruptRecord { reason, .. }) => {
                warn!(%reason, "current session record unreadable; ignoring");
                Ok(None)
            }
            other => other,
        }
    }

    pub fn set_current_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        save_json(self.inner.storage.as_ref(), slots::SESSION_CURRENT, record)
    }

    fn clear(&self, reason: &'static str) -> Result<(), StoreError> {
        let mut snap = self.inner.snapshot.write();
        let next = snap.cleared();
        discard_bundle(self.inner.storage.as_ref())?;
        *snap = next;
        info!(reason, "session cleared");
        Ok(())
    }

    /// Compute, persist, publish. `step` returning `None` means no change.
    fn commit<F>(&self, step: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&SessionData) -> Option<SessionData>,
    {
        let mut snap = self.inner.snapshot.write();
        let Some(next) = step(&snap) else {
            return Ok(false);
        };
        save_json(self.inner.storage.as_ref(), slots::SESSION_BUNDLE, &next)?;
        *snap = next;
        Ok(true)
    }
}

fn discard_bundle(storage: &dyn KeyValueStore) -> Result<(), StoreError> {
    storage.remove(slots::SESSION_BUNDLE)?;
    storage.remove(slots::SESSION_CURRENT)
}
