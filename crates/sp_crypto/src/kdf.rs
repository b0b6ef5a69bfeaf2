//! Key derivation
//!
//! `hkdf_expand`: HKDF-SHA256 over raw key-agreement output.
//! `response_key`: the per-response symmetric key bound to both public halves.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;
use crate::keys::SharedSecret;

pub const HANDSHAKE_SALT: &[u8] = b"sealpay-handshake-v1";
pub const RESPONSE_INFO: &[u8] = b"sealpay-response-v1";

/// Expand `ikm` + `info` into `output.len()` bytes of key material.
///
/// `salt` may be `None` (HKDF will use a zeroed salt).
pub fn hkdf_expand(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    output: &mut [u8],
) -> Result<(), CryptoError> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    hk.expand(info, output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// Derive the 32-byte response key from an X25519 output.
///
/// info = RESPONSE_INFO || server_ephemeral || client_public
pub fn response_key(
    dh_output: &[u8; 32],
    server_ephemeral: &[u8; 32],
    client_public: &[u8; 32],
) -> Result<SharedSecret, CryptoError> {
    let mut info = Vec::with_capacity(RESPONSE_INFO.len() + 64);
    info.extend_from_slice(RESPONSE_INFO);
    info.extend_from_slice(server_ephemeral);
    info.extend_from_slice(client_public);

    let mut key = [0u8; 32];
    hkdf_expand(dh_output, Some(HANDSHAKE_SALT), &info, &mut key)?;
    Ok(SharedSecret::from_bytes(key))
}
