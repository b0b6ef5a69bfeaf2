//! sp_store: Durable client state for the SealPay session core
//!
//! # What lives here
//! - the per-installation device identity (id + label),
//! - the device X25519 key pair,
//! - the authenticated session bundle and the decoded current-session record.
//!
//! Device identity and keys outlive every login; only the session bundle is
//! cleared on logout or self-revocation.
//!
//! # Persistence
//! Everything goes through the `KeyValueStore` trait: `FileStore` writes one
//! JSON file per slot with atomic replace, `MemoryStore` backs tests.

pub mod device;
pub mod error;
pub mod keypair;
pub mod paths;
pub mod session;
pub mod storage;

pub use device::DeviceIdentity;
pub use error::StoreError;
pub use keypair::KeyMaterial;
pub use session::{SessionData, SessionPatch, SessionStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
