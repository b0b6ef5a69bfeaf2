//! One-shot response handshake.
//!
//! Every privileged response carries fresh handshake material: the server's
//! ephemeral X25519 public key `E`. The device completes the agreement with
//! its private key `d`:
//!
//!   dh  = X25519(d, E)                       (must be contributory)
//!   key = HKDF-SHA256(salt = "sealpay-handshake-v1", ikm = dh,
//!                     info = "sealpay-response-v1" || E || pub(d))
//!   pt  = XChaCha20-Poly1305-Open(key, data, aad = E)
//!
//! Wire encoding: both `handshake` and `data` are base64url without padding;
//! `data` is `nonce(24) || ciphertext || tag(16)`.
//!
//! Nothing is kept between calls. Compromise of one response key exposes
//! only that response.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use serde::{de, de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use x25519_dalek::EphemeralSecret;
use zeroize::Zeroizing;

use crate::{
    aead,
    error::CryptoError,
    kdf,
    keys::{to_32, PrivateKey, PublicKey, SharedSecret},
};

// ── Wire types ───────────────────────────────────────────────────────────────

/// Server-supplied key-agreement contribution for one response.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HandshakeMaterial([u8; 32]);

impl HandshakeMaterial {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = URL_SAFE_NO_PAD.decode(s.trim())?;
        Ok(Self(to_32(&bytes, "Handshake material")?))
    }

    pub fn to_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.0)
    }
}

impl fmt::Debug for HandshakeMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandshakeMaterial").field(&self.to_b64()).finish()
    }
}

/// AEAD output in wire layout (nonce || ciphertext || tag).
#[derive(Clone, PartialEq, Eq)]
pub struct Ciphertext(Vec<u8>);

impl Ciphertext {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = URL_SAFE_NO_PAD.decode(s.trim())?;
        if bytes.len() < aead::NONCE_LEN + aead::TAG_LEN {
            return Err(CryptoError::MalformedCiphertext(format!(
                "{} bytes is shorter than nonce and tag",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn to_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.0)
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ciphertext({} bytes)", self.0.len())
    }
}

macro_rules! b64_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_b64())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                <$ty>::from_b64(&s).map_err(de::Error::custom)
            }
        }
    };
}

b64_serde!(HandshakeMaterial);
b64_serde!(Ciphertext);

/// A sealed payload as a server would emit it: `data` + `handshake`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sealed {
    pub ciphertext: Ciphertext,
    pub handshake: HandshakeMaterial,
}

// ── Client side ──────────────────────────────────────────────────────────────

/// Complete the agreement and derive this response's symmetric key.
pub fn derive_key(
    private: &PrivateKey,
    handshake: &HandshakeMaterial,
) -> Result<SharedSecret, CryptoError> {
    let dh = private.agree(&handshake.public_key());
    if !dh.was_contributory() {
        return Err(CryptoError::NonContributory);
    }
    kdf::response_key(
        dh.as_bytes(),
        handshake.as_bytes(),
        private.public_key().as_bytes(),
    )
}

/// Authenticated-decrypt one response body.
///
/// Returns plaintext only when the tag verifies; there is no partial output.
pub fn decrypt(
    ciphertext: &Ciphertext,
    handshake: &HandshakeMaterial,
    private: &PrivateKey,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let key = derive_key(private, handshake)?;
    aead::decrypt(key.as_bytes(), ciphertext.as_bytes(), handshake.as_bytes())
}

/// Decrypt, then parse the plaintext as JSON into `T`.
pub fn parse_data<T: DeserializeOwned>(
    ciphertext: &Ciphertext,
    private: &PrivateKey,
    handshake: &HandshakeMaterial,
) -> Result<T, CryptoError> {
    let plaintext = decrypt(ciphertext, handshake, private)?;
    serde_json::from_slice(&plaintext).map_err(CryptoError::MalformedPayload)
}

// ── Server side ──────────────────────────────────────────────────────────────

/// Encrypt `plaintext` to `recipient` under a fresh ephemeral key.
pub fn seal(plaintext: &[u8], recipient: &PublicKey) -> Result<Sealed, CryptoError> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let handshake = HandshakeMaterial(x25519_dalek::PublicKey::from(&ephemeral).to_bytes());

    let dh = ephemeral.diffie_hellman(&recipient.to_dalek());
    if !dh.was_contributory() {
        return Err(CryptoError::NonContributory);
    }
    let key = kdf::response_key(dh.as_bytes(), handshake.as_bytes(), recipient.as_bytes())?;
    let ciphertext = aead::encrypt(key.as_bytes(), plaintext, handshake.as_bytes())?;

    Ok(Sealed {
        ciphertext: Ciphertext(ciphertext),
        handshake,
    })
}

pub fn seal_json<T: Serialize>(value: &T, recipient: &PublicKey) -> Result<Sealed, CryptoError> {
    let bytes = Zeroizing::new(serde_json::to_vec(value)?);
    seal(&bytes, recipient)
}
