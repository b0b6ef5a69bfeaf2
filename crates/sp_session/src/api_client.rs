use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::warn;

use sp_crypto::KeyPair;
use sp_proto::api::{LoginRequest, ProfileBundle};
use sp_proto::{headers, Envelope};
use sp_store::DeviceIdentity;

use crate::error::ClientError;
use crate::transport::{ApiRequest, HttpResponse, Method, Transport};

const UNAUTHORIZED: u16 = 401;

/// Endpoint paths, relative to the API base URL.
pub mod paths {
    pub const LOGIN: &str = "/auth/login";
    pub const PROFILE: &str = "/user/profile";
    pub const WALLETS: &str = "/wallets";
    pub const TX_STATS: &str = "/transactions/stats";
    pub const EXCHANGE_RATES: &str = "/exchange-rates";
    pub const SESSIONS: &str = "/sessions";
    pub const CURRENT_SESSION: &str = "/sessions/current";

    pub fn session(id: &str) -> String {
        format!("{SESSIONS}/{id}")
    }
}

/// What a privileged request is signed with.
#[derive(Clone)]
pub struct Credentials {
    pub device_id: String,
    pub keys: KeyPair,
    pub token: String,
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// `POST /auth/login`. Carries device headers but no bearer token; the
    /// sealed response is opened with the device key.
    pub async fn login(
        &self,
        device: &DeviceIdentity,
        keys: &KeyPair,
        email: &str,
        password: &str,
    ) -> Result<ProfileBundle, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            device_id: device.device_id.clone(),
            device_name: device.device_name.clone(),
        };
        let request = ApiRequest::new(Method::Post, paths::LOGIN)
            .header(headers::DEVICE_ID, device.device_id.as_str())
            .header(headers::CLIENT_PUBLIC_KEY, keys.public().to_b64())
            .json(serde_json::to_value(&body).map_err(|e| ClientError::Validation(e.to_string()))?);

        let envelope = self.exchange(request).await?;
        Ok(envelope.open(keys.private())?)
    }

    /// Privileged GET whose `data` is sealed to the device key.
    pub async fn get_sealed<T: DeserializeOwned>(
        &self,
        path: &str,
        creds: &Credentials,
    ) -> Result<T, ClientError> {
        let request = signed(ApiRequest::new(Method::Get, path), creds);
        let envelope = self.exchange(request).await?;
        Ok(envelope.open(creds.keys.private())?)
    }

    /// Privileged DELETE acknowledged by a status-only envelope.
    pub async fn delete(&self, path: &str, creds: &Credentials) -> Result<(), ClientError> {
        let request = signed(ApiRequest::new(Method::Delete, path), creds);
        let envelope = self.exchange(request).await?;
        Ok(envelope.expect_success()?)
    }

    async fn exchange(&self, request: ApiRequest) -> Result<Envelope, ClientError> {
        let path = request.path.clone();
        let response = self.transport.send(request).await?;
        read_envelope(&path, response)
    }
}

fn signed(request: ApiRequest, creds: &Credentials) -> ApiRequest {
    request
        .header(headers::DEVICE_ID, creds.device_id.as_str())
        .header(headers::CLIENT_PUBLIC_KEY, creds.keys.public().to_b64())
        .bearer(creds.token.as_str())
}

/// Classify a raw response: 401 expires the session, an unparseable body is
/// a network-class failure on non-2xx and a protocol failure otherwise,
/// `status = "error"` is a protocol failure with the server's message.
pub(crate) fn read_envelope(path: &str, response: HttpResponse) -> Result<Envelope, ClientError> {
    if response.status == UNAUTHORIZED {
        warn!(path, "server rejected session token");
        return Err(ClientError::SessionExpired);
    }
    let envelope: Envelope = match serde_json::from_slice(&response.body) {
        Ok(envelope) => envelope,
        Err(_) if !(200..300).contains(&response.status) => {
            return Err(ClientError::Network(format!("HTTP {}", response.status)));
        }
        Err(err) => {
            warn!(path, error = %err, "unreadable response envelope");
            return Err(ClientError::Protocol(format!("Unreadable response: {err}")));
        }
    };
    if !envelope.is_success() {
        return Err(ClientError::Protocol(envelope.server_message()));
    }
    Ok(envelope)
}
