//! API request/response types shared with the SealPay backend.
//! Response types are what `Envelope::open` yields after decryption.
//!
//! Every field is optional on the wire (`#[serde(default)]`): the dashboard
//! backend omits empty slices rather than sending `[]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Auth ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub device_id: String,
    pub device_name: String,
}

/// Decrypted body of a successful login: bearer token plus the initial
/// profile bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileBundle {
    #[serde(alias = "authorization")]
    pub token: String,
    pub user: User,
    pub wallets: Vec<Wallet>,
    pub transactions: Vec<Transaction>,
    pub sender: Option<Sender>,
    pub banks: Vec<Bank>,
    pub other_sessions: Vec<SessionRecord>,
    pub exchange_rate: Vec<ExchangeRate>,
    pub tx_stat: TxStat,
}

/// Decrypted body of `GET /user/profile`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdate {
    pub user: User,
    pub sender: Option<Sender>,
    pub banks: Vec<Bank>,
}

// ── Profile slices ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Wallet {
    pub id: String,
    pub currency: String,
    pub balance: f64,
    pub account_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    pub id: String,
    pub reference: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sender {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Bank {
    pub id: String,
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExchangeRate {
    pub from: String,
    pub to: String,
    pub rate: f64,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TxStat {
    pub total: u64,
    pub pending: u64,
    pub successful: u64,
    pub failed: u64,
    pub volume: f64,
}

// ── Sessions ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeoLocation {
    pub country: String,
    pub city: Option<String>,
}

/// One authenticated device/browser context as tracked by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionRecord {
    pub id: String,
    pub device_type: String,
    pub ip_address: String,
    pub geo_location: GeoLocation,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionList {
    pub current: SessionRecord,
    pub others: Vec<SessionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_bundle_accepts_authorization_alias_and_sparse_body() {
        let bundle: ProfileBundle = serde_json::from_value(json!({
            "authorization": "tok-123",
            "user": { "id": "u1", "firstName": "Ada", "email": "ada@example.com" },
            "wallets": [{ "id": "w1", "currency": "USD", "balance": 10.5 }]
        }))
        .unwrap();
        assert_eq!(bundle.token, "tok-123");
        assert_eq!(bundle.user.first_name, "Ada");
        assert_eq!(bundle.wallets.len(), 1);
        assert!(bundle.banks.is_empty());
        assert_eq!(bundle.tx_stat, TxStat::default());
    }

    #[test]
    fn session_record_wire_names() {
        let rec: SessionRecord = serde_json::from_value(json!({
            "id": "s1",
            "deviceType": "desktop",
            "ipAddress": "10.0.0.2",
            "geoLocation": { "country": "NG" },
            "lastAccessedAt": "2026-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(rec.geo_location.country, "NG");
        assert!(rec.last_accessed_at.is_some());
    }

    #[test]
    fn profile_update_without_sender() {
        let update: ProfileUpdate = serde_json::from_value(json!({
            "user": { "id": "u1", "lastName": "Lovelace" },
            "banks": [{ "id": "b1", "bankName": "First", "accountNumber": "0123" }]
        }))
        .unwrap();
        assert!(update.sender.is_none());
        assert_eq!(update.user.last_name, "Lovelace");
        assert_eq!(update.banks[0].account_number, "0123");
    }

    #[test]
    fn transaction_type_field() {
        let tx: Transaction =
            serde_json::from_value(json!({ "id": "t1", "type": "deposit", "amount": 5 })).unwrap();
        assert_eq!(tx.kind, "deposit");
        assert_eq!(tx.amount, 5.0);
    }
}
