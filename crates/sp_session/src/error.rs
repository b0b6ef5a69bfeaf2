use thiserror::Error;

use sp_crypto::CryptoError;
use sp_proto::EnvelopeError;
use sp_store::StoreError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure or timeout. Retryable; session state untouched.
    #[error("Network error: {0}")]
    Network(String),

    /// `status = "error"` from the server, message verbatim.
    #[error("{0}")]
    Protocol(String),

    #[error("Response is missing handshake material")]
    HandshakeMissing,

    #[error("Response could not be decrypted: {0}")]
    DecryptionFailure(String),

    #[error("Session expired")]
    SessionExpired,

    /// Rejected locally before any request was made.
    #[error("{0}")]
    Validation(String),

    #[error("Local storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ClientError {
    /// Errors that end the authenticated session.
    pub fn forces_logout(&self) -> bool {
        matches!(
            self,
            Self::HandshakeMissing | Self::DecryptionFailure(_) | Self::SessionExpired
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<EnvelopeError> for ClientError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Rejected(message) => Self::Protocol(message),
            EnvelopeError::HandshakeMissing => Self::HandshakeMissing,
            EnvelopeError::MalformedData(reason) => Self::DecryptionFailure(reason),
            EnvelopeError::Crypto(err) => err.into(),
        }
    }
}

impl From<CryptoError> for ClientError {
    fn from(err: CryptoError) -> Self {
        Self::DecryptionFailure(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
