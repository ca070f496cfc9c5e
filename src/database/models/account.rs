use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::identity::Role;

/// A login-capable account. Customers own visits and requests; employees and
/// admins are staff.
///
/// `password_hash` is NULL while the account is awaiting activation from an
/// invitation. Sensitive columns never serialize into API payloads.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub name: String,
    pub role: Role,
    pub address: Option<String>,
    #[serde(skip_serializing)]
    pub activation_token_digest: Option<String>,
    #[serde(skip_serializing)]
    pub activation_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: Option<String>,
    pub name: String,
    pub role: Role,
    pub address: Option<String>,
    pub activation_token_digest: Option<String>,
    pub activation_expires_at: Option<DateTime<Utc>>,
}

/// Full-update payload for an account. `password_hash: None` leaves the
/// stored hash untouched; `address: None` clears the column.
#[derive(Debug, Clone)]
pub struct AccountChanges {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub address: Option<String>,
    pub password_hash: Option<String>,
}
