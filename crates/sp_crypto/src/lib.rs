//! sp_crypto: SealPay device keys and response handshake
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Key material travels as distinct newtypes so a public key can never be
//!   handed to a function expecting a derived secret.
//!
//! # Module layout
//! - `keys`: X25519 device key pair, public/private/shared-secret types
//! - `handshake`: one-shot key agreement + authenticated response decryption
//! - `aead`: XChaCha20-Poly1305 encrypt/decrypt helpers
//! - `kdf`: HKDF-SHA256 derivation of the per-response key
//! - `error`: unified error type

pub mod aead;
pub mod error;
pub mod handshake;
pub mod kdf;
pub mod keys;

pub use error::CryptoError;
pub use handshake::{Ciphertext, HandshakeMaterial, Sealed};
pub use keys::{KeyPair, PrivateKey, PublicKey, SharedSecret};
