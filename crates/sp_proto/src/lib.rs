//! sp_proto: Wire types shared between the SealPay client core and the API
//!
//! All bodies are JSON. Field names follow the API's camelCase convention.
//!
//! # Modules
//! - `envelope`: the `{status, data, handshake, ...}` wrapper on every response
//! - `api`: decrypted payload types and request bodies
//! - `headers`: header names attached to privileged requests

pub mod api;
pub mod envelope;
pub mod headers;

pub use envelope::{Envelope, EnvelopeError, Pagination, Status};
