//! Scripted in-process API server.
//!
//! Replies are queued per `METHOD path`. Sealed replies are encrypted to the
//! key the request advertised in `x-client-public-key`, exactly as the real
//! backend does, so a request with wrong headers cannot be opened.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use parking_lot::Mutex;
use serde_json::{json, Value};

use sp_crypto::handshake::seal_json;
use sp_crypto::{KeyPair, PublicKey};
use sp_proto::{headers, Envelope};
use sp_session::{ApiRequest, ClientError, HttpResponse, Method, SecureSession, Transport};
use sp_store::{KeyValueStore, MemoryStore};

pub enum Reply {
    Sealed(Value),
    /// Sealed, then one bit of the ciphertext flipped.
    Tampered(Value),
    /// Sealed to a key other than the one in the request.
    WrongRecipient(Value),
    MissingHandshake(Value),
    Ack,
    Failure(u16, &'static str),
    Unauthorized,
    Offline,
    Delayed(Duration, Value),
}

#[derive(Default)]
pub struct MockServer {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

fn route(method: Method, path: &str) -> String {
    format!("{method:?} {path}")
}

impl MockServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, path: &str, reply: Reply) {
        self.replies
            .lock()
            .entry(route(method, path))
            .or_default()
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        self.requests.lock().last().cloned()
    }
}

fn respond(status: u16, envelope: &Envelope) -> HttpResponse {
    HttpResponse {
        status,
        body: serde_json::to_vec(envelope).unwrap(),
    }
}

fn sealed_to(body: &Value, key: &PublicKey) -> Envelope {
    Envelope::sealed(seal_json(body, key).unwrap())
}

#[async_trait]
impl Transport for MockServer {
    async fn send(&self, request: ApiRequest) -> Result<HttpResponse, ClientError> {
        self.requests.lock().push(request.clone());
        let next = self
            .replies
            .lock()
            .get_mut(&route(request.method, &request.path))
            .and_then(VecDeque::pop_front);
        let device_key = request
            .header_value(headers::CLIENT_PUBLIC_KEY)
            .and_then(|k| PublicKey::from_b64(k).ok());

        let Some(reply) = next else {
            return Ok(respond(404, &Envelope::failure("Route not found")));
        };
        let sealed = |body: &Value| match &device_key {
            Some(key) => Ok(respond(200, &sealed_to(body, key))),
            None => Ok(respond(400, &Envelope::failure("Missing client public key"))),
        };

        match reply {
            Reply::Sealed(body) => sealed(&body),
            Reply::Delayed(delay, body) => {
                tokio::time::sleep(delay).await;
                sealed(&body)
            }
            Reply::Tampered(body) => {
                let key = device_key.expect("request carried no public key");
                let mut envelope = sealed_to(&body, &key);
                let data = envelope.data.as_str().unwrap().to_string();
                let mut raw = URL_SAFE_NO_PAD.decode(data).unwrap();
                let mid = raw.len() / 2;
                raw[mid] ^= 0x01;
                envelope.data = Value::String(URL_SAFE_NO_PAD.encode(raw));
                Ok(respond(200, &envelope))
            }
            Reply::WrongRecipient(body) => {
                let stranger = KeyPair::generate();
                Ok(respond(200, &sealed_to(&body, stranger.public())))
            }
            Reply::MissingHandshake(body) => {
                let key = device_key.expect("request carried no public key");
                let mut envelope = sealed_to(&body, &key);
                envelope.handshake = None;
                Ok(respond(200, &envelope))
            }
            Reply::Ack => Ok(respond(200, &Envelope::ack("Session revoked"))),
            Reply::Failure(status, message) => Ok(respond(status, &Envelope::failure(message))),
            Reply::Unauthorized => Ok(respond(401, &Envelope::failure("Token expired"))),
            Reply::Offline => Err(ClientError::Network("connection refused".into())),
        }
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn login_body(token: &str) -> Value {
    json!({
        "token": token,
        "user": { "id": "u-1", "firstName": "Ada", "lastName": "Obi", "email": "ada@example.com" },
        "wallets": [{ "id": "w-usd", "currency": "USD", "balance": 100.0 }],
        "transactions": [{ "id": "t-1", "amount": 10.0, "currency": "USD", "type": "deposit" }],
        "banks": [],
        "otherSessions": [
            { "id": "sess-A", "deviceType": "mobile" },
            { "id": "sess-B", "deviceType": "browser" }
        ],
        "exchangeRate": [{ "from": "USD", "to": "NGN", "rate": 1500.0 }],
        "txStat": { "total": 1 }
    })
}

pub fn current_session_body() -> Value {
    json!({ "id": "sess-C", "deviceType": "desktop", "ipAddress": "10.0.0.9",
            "geoLocation": { "country": "NG", "city": "Lagos" } })
}

pub struct Harness {
    pub server: Arc<MockServer>,
    pub storage: Arc<MemoryStore>,
    pub session: SecureSession,
}

impl Harness {
    pub fn new() -> Self {
        let server = MockServer::new();
        let storage = Arc::new(MemoryStore::new());
        let session = SecureSession::open(storage.clone(), server.clone()).unwrap();
        Self {
            server,
            storage,
            session,
        }
    }

    pub async fn signed_in() -> Self {
        let harness = Self::new();
        harness
            .server
            .on(Method::Post, "/auth/login", Reply::Sealed(login_body("tok-1")));
        harness
            .session
            .login("ada@example.com", "correct horse")
            .await
            .unwrap();
        harness
    }

    /// A second client over the same persisted state.
    pub fn reopen(&self) -> SecureSession {
        let storage: Arc<dyn KeyValueStore> = self.storage.clone();
        SecureSession::open(storage, self.server.clone()).unwrap()
    }
}
