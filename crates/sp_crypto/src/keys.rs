//! Device key material
//!
//! Each installation owns one X25519 `KeyPair`. The public half travels in
//! request headers as handshake material; the private half never leaves the
//! device and is only used to complete the server's one-shot agreement.
//!
//! Every kind of key is its own type:
//! - `PublicKey`: 32-byte X25519 public key, base64url on the wire
//! - `PrivateKey`: X25519 static secret, zeroized on drop
//! - `SharedSecret`: 32-byte symmetric key derived from an agreement

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use x25519_dalek::StaticSecret;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

pub const KEY_LEN: usize = 32;

pub(crate) fn to_32(bytes: &[u8], what: &str) -> Result<[u8; 32], CryptoError> {
    bytes.try_into().map_err(|_| {
        CryptoError::InvalidKey(format!("{what} must be {KEY_LEN} bytes, got {}", bytes.len()))
    })
}

// ── Public key ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = URL_SAFE_NO_PAD.decode(s.trim())?;
        Ok(Self(to_32(&bytes, "Public key")?))
    }

    /// Human-readable fingerprint: BLAKE3 of the key, truncated to 20 bytes,
    /// hex-encoded in groups of 4.
    ///
    /// Example: "a1b2 c3d4 e5f6 7890 abcd ef01 2345 6789 0abc def0"
    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(&self.0);
        let hex = hex::encode(&hash.as_bytes()[..20]);
        hex.as_bytes()
            .chunks(4)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn to_dalek(self) -> x25519_dalek::PublicKey {
        x25519_dalek::PublicKey::from(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_b64()).finish()
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_b64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_b64(&s).map_err(de::Error::custom)
    }
}

// ── Private key ──────────────────────────────────────────────────────────────

/// X25519 static secret. Not serialisable: persistence goes through
/// `to_b64` explicitly so every write of the secret is visible at the call site.
#[derive(Clone)]
pub struct PrivateKey(StaticSecret);

impl PrivateKey {
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(OsRng))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(URL_SAFE_NO_PAD.decode(s.trim())?);
        let arr = Zeroizing::new(to_32(&bytes, "Private key")?);
        Ok(Self::from_bytes(*arr))
    }

    pub fn to_b64(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.0.to_bytes());
        Zeroizing::new(URL_SAFE_NO_PAD.encode(&*bytes))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(x25519_dalek::PublicKey::from(&self.0).to_bytes())
    }

    pub(crate) fn agree(&self, peer: &PublicKey) -> x25519_dalek::SharedSecret {
        self.0.diffie_hellman(&peer.to_dalek())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

// ── Shared secret ────────────────────────────────────────────────────────────

/// Symmetric key derived from one handshake. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

// ── Key pair ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct KeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self::from_private(PrivateKey::generate())
    }

    pub fn from_private(private: PrivateKey) -> Self {
        Self {
            public: private.public_key(),
            private,
        }
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn private(&self) -> &PrivateKey {
        &self.private
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_key_b64_roundtrip_keeps_public_half() {
        let pair = KeyPair::generate();
        let restored = PrivateKey::from_b64(&pair.private().to_b64()).unwrap();
        assert_eq!(restored.public_key(), *pair.public());
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        let short = URL_SAFE_NO_PAD.encode([0u8; 31]);
        assert!(matches!(
            PublicKey::from_b64(&short),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn public_key_serialises_as_b64_string() {
        let key = KeyPair::generate().public;
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", key.to_b64()));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn fingerprint_is_grouped_hex() {
        let fp = PublicKey::from_bytes([3u8; 32]).fingerprint();
        let groups: Vec<&str> = fp.split(' ').collect();
        assert_eq!(groups.len(), 10);
        assert!(groups.iter().all(|g| g.len() == 4));
    }

    #[test]
    fn debug_never_prints_secret() {
        let pair = KeyPair::generate();
        let rendered = format!("{pair:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(pair.private().to_b64().as_str()));
    }
}
