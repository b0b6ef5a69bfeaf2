//! Per-installation device identity.
//!
//! The id is a random UUID generated on first use; the label is derived once
//! from the host name and OS. Both are independent of any user account and
//! survive logout.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::storage::{load_json, save_json, slots, KeyValueStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub device_id: String,
    pub device_name: String,
}

impl DeviceIdentity {
    pub fn ensure(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        Ok(Self {
            device_id: ensure_device_id(store)?,
            device_name: ensure_device_name(store)?,
        })
    }
}

/// Return the persisted device id, generating it on first call.
pub fn ensure_device_id(store: &dyn KeyValueStore) -> Result<String, StoreError> {
    ensure_slot(store, slots::DEVICE_ID, || uuid::Uuid::new_v4().to_string())
}

/// Return the persisted device label, deriving it on first call.
pub fn ensure_device_name(store: &dyn KeyValueStore) -> Result<String, StoreError> {
    ensure_slot(store, slots::DEVICE_NAME, default_device_name)
}

fn ensure_slot(
    store: &dyn KeyValueStore,
    key: &str,
    make: impl FnOnce() -> String,
) -> Result<String, StoreError> {
    match load_json::<String>(store, key) {
        Ok(Some(value)) if !value.trim().is_empty() => return Ok(value),
        Ok(_) => {}
        Err(StoreError::CorruptRecord { reason, .. }) => {
            warn!(slot = key, %reason, "device identity record unreadable; regenerating");
        }
        Err(e) => return Err(e),
    }
    let value = make();
    save_json(store, key, &value)?;
    info!(slot = key, "device identity created");
    Ok(value)
}

fn default_device_name() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "unknown-device".to_string());
    format!("{host} ({})", std::env::consts::OS)
}
