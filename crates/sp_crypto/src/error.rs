use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("AEAD encryption failed")]
    AeadEncrypt,

    #[error("AEAD decryption failed (authentication tag mismatch, possible tampering)")]
    AeadDecrypt,

    #[error("Key agreement produced a non-contributory shared secret")]
    NonContributory,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("Decrypted payload is not valid JSON for the expected type: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

impl CryptoError {
    /// True for every failure that means "this response cannot be trusted":
    /// bad structure, bad key material, failed agreement or a tag mismatch.
    pub fn is_decryption_failure(&self) -> bool {
        !matches!(self, CryptoError::AeadEncrypt | CryptoError::Serialisation(_))
    }
}
