//! Request headers carried by every privileged call.

/// Stable per-installation device id.
pub const DEVICE_ID: &str = "x-device-id";

/// Device X25519 public key (base64url), the client's handshake material.
pub const CLIENT_PUBLIC_KEY: &str = "x-client-public-key";
