//! sp_session: Authenticated session core for the SealPay wallet client
//!
//! Ties the device identity, key pair and session bundle from `sp_store` to
//! the encrypted API. Every privileged response is decrypted with the device
//! private key before anything reaches the session store; a response that
//! fails to authenticate is never applied.
//!
//! # Modules
//! - `client`: `SecureSession` (bootstrap, login, refresh, logout)
//! - `local_session`: current-session descriptor, session list, revocation
//! - `lifecycle`: ANONYMOUS / AUTHENTICATING / AUTHENTICATED / EXPIRED
//! - `api_client`: privileged request headers and envelope handling
//! - `transport`: HTTP seam (`Transport` trait, reqwest implementation)
//! - `scheduler`: cancellable periodic tasks
//! - `config`: client configuration
//! - `error`: `ClientError`

pub mod api_client;
pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod local_session;
pub mod scheduler;
pub mod transport;

pub use client::SecureSession;
pub use config::ClientConfig;
pub use error::ClientError;
pub use lifecycle::{Lifecycle, SessionEvent, SessionState};
pub use local_session::{LocalSessionCodec, RevokeOutcome};
pub use scheduler::ScheduledTask;
pub use transport::{ApiRequest, HttpResponse, HttpTransport, Method, Transport};
