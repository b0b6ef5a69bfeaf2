//! Response envelope: the outer JSON shape of every API response.
//!
//! ```json
//! { "status": "success", "data": "<ciphertext>", "handshake": "<server key>",
//!   "message": "...", "error": "...", "pagination": { ... } }
//! ```
//!
//! On privileged endpoints a `success` envelope MUST carry `handshake`, and
//! `data` is ciphertext. A missing handshake is a protocol violation, never
//! an empty result.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use sp_crypto::{handshake, Ciphertext, CryptoError, HandshakeMaterial, PrivateKey, Sealed};

const DEFAULT_FAILURE: &str = "Request failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub status: Status,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handshake: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// `status = "error"`; carries the server's message verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("Success envelope without handshake material")]
    HandshakeMissing,

    #[error("Envelope data is not a ciphertext string: {0}")]
    MalformedData(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl Envelope {
    /// Success envelope as the server emits it for a privileged endpoint.
    pub fn sealed(sealed: Sealed) -> Self {
        Self {
            status: Status::Success,
            data: serde_json::Value::String(sealed.ciphertext.to_b64()),
            handshake: Some(sealed.handshake.to_b64()),
            message: None,
            error: None,
            pagination: None,
        }
    }

    /// Success envelope without encrypted data (acknowledgements).
    pub fn ack(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            data: serde_json::Value::Null,
            handshake: None,
            message: Some(message.into()),
            error: None,
            pagination: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            data: serde_json::Value::Null,
            handshake: None,
            message: Some(message.into()),
            error: None,
            pagination: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// The server-supplied failure text: `message`, then `error`, then a
    /// generic fallback.
    pub fn server_message(&self) -> String {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_FAILURE)
            .to_string()
    }

    /// Check status only. Used by command endpoints that return no data.
    pub fn expect_success(&self) -> Result<(), EnvelopeError> {
        match self.status {
            Status::Success => Ok(()),
            Status::Error => Err(EnvelopeError::Rejected(self.server_message())),
        }
    }

    /// Extract the ciphertext and handshake of a privileged success envelope.
    pub fn sealed_parts(&self) -> Result<(Ciphertext, HandshakeMaterial), EnvelopeError> {
        self.expect_success()?;

        let handshake = match self.handshake.as_deref().map(str::trim) {
            Some(h) if !h.is_empty() => HandshakeMaterial::from_b64(h)?,
            _ => return Err(EnvelopeError::HandshakeMissing),
        };

        let data = self.data.as_str().ok_or_else(|| {
            EnvelopeError::MalformedData(format!("expected string, got {}", json_kind(&self.data)))
        })?;
        let ciphertext = Ciphertext::from_b64(data)?;

        Ok((ciphertext, handshake))
    }

    /// Decrypt and parse `data` into `T` with the device private key.
    pub fn open<T: DeserializeOwned>(&self, private: &PrivateKey) -> Result<T, EnvelopeError> {
        let (ciphertext, handshake) = self.sealed_parts()?;
        Ok(handshake::parse_data(&ciphertext, private, &handshake)?)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
