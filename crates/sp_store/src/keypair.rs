//! Persistent device key pair.
//!
//! Generated once per installation. The stored record carries both halves so
//! a mismatch between them is detectable; any record that fails to decode or
//! verify is treated as corrupt and replaced. Replacing the pair makes every
//! ciphertext addressed to the old key undecryptable, so callers must drop
//! cached session state whenever `KeyMaterial::generated` is set.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use sp_crypto::{KeyPair, PrivateKey, PublicKey};

use crate::error::StoreError;
use crate::storage::{load_json, save_json, slots, KeyValueStore};

const KEYPAIR_RECORD_VERSION: u8 = 1;

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
struct StoredKeyPair {
    version: u8,
    public_key: String,
    private_key: String,
}

#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub pair: KeyPair,
    /// True when the pair was created by this call (first run, or the
    /// previous record was missing or corrupt).
    pub generated: bool,
}

/// Return the persisted key pair, generating and persisting one if needed.
pub fn ensure_key_pair(store: &dyn KeyValueStore) -> Result<KeyMaterial, StoreError> {
    match load_key_pair(store) {
        Ok(Some(pair)) => {
            return Ok(KeyMaterial {
                pair,
                generated: false,
            })
        }
        Ok(None) => {}
        Err(StoreError::CorruptRecord { reason, .. }) => {
            warn!(%reason, "device key pair is corrupt; generating a new one");
        }
        Err(e) => return Err(e),
    }

    let pair = KeyPair::generate();
    save_key_pair(store, &pair)?;
    info!(fingerprint = %pair.public().fingerprint(), "device key pair generated");
    Ok(KeyMaterial {
        pair,
        generated: true,
    })
}

fn load_key_pair(store: &dyn KeyValueStore) -> Result<Option<KeyPair>, StoreError> {
    let Some(record) = load_json::<StoredKeyPair>(store, slots::DEVICE_KEYPAIR)? else {
        return Ok(None);
    };
    let corrupt = |reason: String| StoreError::CorruptRecord {
        key: slots::DEVICE_KEYPAIR.to_string(),
        reason,
    };

    if record.version != KEYPAIR_RECORD_VERSION {
        return Err(corrupt(format!("unknown record version {}", record.version)));
    }
    let private = PrivateKey::from_b64(&record.private_key).map_err(|e| corrupt(e.to_string()))?;
    let public = PublicKey::from_b64(&record.public_key).map_err(|e| corrupt(e.to_string()))?;
    if private.public_key() != public {
        return Err(corrupt("public key does not match private key".into()));
    }
    Ok(Some(KeyPair::from_private(private)))
}

fn save_key_pair(store: &dyn KeyValueStore, pair: &KeyPair) -> Result<(), StoreError> {
    let record = StoredKeyPair {
        version: KEYPAIR_RECORD_VERSION,
        public_key: pair.public().to_b64(),
        private_key: pair.private().to_b64().to_string(),
    };
    save_json(store, slots::DEVICE_KEYPAIR, &record)
}
