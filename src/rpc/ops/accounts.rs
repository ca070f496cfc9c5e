use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth;
use crate::database::models::{AccountChanges, NewAccount};
use crate::database::Store;
use crate::error::ApiError;
use crate::identity::{Identity, Role};
use crate::rpc::validate::{self, Validate};
use crate::rpc::{parse_input, to_payload};

/// How long an invitation stays redeemable.
const ACTIVATION_TTL_DAYS: i64 = 7;

fn hash_password(plain: &str) -> Result<String, ApiError> {
    auth::hash_password(plain).map_err(|e| {
        tracing::error!("bcrypt failure: {}", e);
        ApiError::internal("Failed to hash password")
    })
}

// ── whoami ────────────────────────────────────────────────────────────

pub async fn whoami(
    _input: Value,
    identity: Identity,
    _store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    match identity {
        Identity::Known {
            account_id,
            name,
            role,
        } => Ok(json!({
            "accountId": account_id,
            "name": name,
            "role": role,
        })),
        Identity::Anonymous => Err(ApiError::unauthorized("Sign in to continue")),
    }
}

// ── createCustomer ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub address: Option<String>,
}

impl Validate for CreateCustomerInput {
    fn validate(&self) -> Result<(), ApiError> {
        validate::non_blank("name", &self.name)?;
        validate::email("email", &self.email)?;
        validate::password("password", &self.password)?;
        Ok(())
    }
}

pub async fn create_customer(
    input: Value,
    identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: CreateCustomerInput = parse_input(input)?;

    // Staff create customers; handing out any other role is an admin call.
    let role = input.role.unwrap_or(Role::Customer);
    if role != Role::Customer && !identity.is_admin() {
        return Err(ApiError::forbidden("Only admins can assign staff roles"));
    }

    let password_hash = hash_password(&input.password)?;
    let account = store
        .insert_account(NewAccount {
            email: input.email.trim().to_string(),
            password_hash: Some(password_hash),
            name: input.name.trim().to_string(),
            role,
            address: input.address,
            activation_token_digest: None,
            activation_expires_at: None,
        })
        .await?;

    to_payload(&account)
}

// ── inviteCustomer ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCustomerInput {
    pub name: String,
    pub email: String,
    pub address: Option<String>,
}

impl Validate for InviteCustomerInput {
    fn validate(&self) -> Result<(), ApiError> {
        validate::non_blank("name", &self.name)?;
        validate::email("email", &self.email)?;
        Ok(())
    }
}

/// Create a passwordless account awaiting activation. The raw token is
/// returned exactly once; only its digest is stored.
pub async fn invite_customer(
    input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: InviteCustomerInput = parse_input(input)?;

    let token = auth::new_activation_token();
    let account = store
        .insert_account(NewAccount {
            email: input.email.trim().to_string(),
            password_hash: None,
            name: input.name.trim().to_string(),
            role: Role::Customer,
            address: input.address,
            activation_token_digest: Some(auth::activation_digest(&token)),
            activation_expires_at: Some(Utc::now() + Duration::days(ACTIVATION_TTL_DAYS)),
        })
        .await?;

    let account = to_payload(&account)?;
    Ok(json!({
        "account": account,
        "activationToken": token,
    }))
}

// ── activateAccount ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateAccountInput {
    pub token: String,
    pub password: String,
}

impl Validate for ActivateAccountInput {
    fn validate(&self) -> Result<(), ApiError> {
        validate::non_blank("token", &self.token)?;
        validate::password("password", &self.password)?;
        Ok(())
    }
}

pub async fn activate_account(
    input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: ActivateAccountInput = parse_input(input)?;

    const INVALID: &str = "invalid or expired activation link";

    let digest = auth::activation_digest(input.token.trim());
    let account = store
        .account_by_activation_digest(&digest)
        .await?
        .ok_or_else(|| ApiError::not_found(INVALID))?;

    match account.activation_expires_at {
        Some(expires_at) if expires_at > Utc::now() => {}
        _ => return Err(ApiError::not_found(INVALID)),
    }

    let password_hash = hash_password(&input.password)?;
    store.activate_account(account.id, password_hash).await?;

    Ok(json!({ "activated": true }))
}

// ── updateUser ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub address: Option<String>,
    pub password: Option<String>,
}

impl Validate for UpdateUserInput {
    fn validate(&self) -> Result<(), ApiError> {
        validate::non_blank("name", &self.name)?;
        validate::email("email", &self.email)?;
        if let Some(password) = &self.password {
            validate::password("password", password)?;
        }
        Ok(())
    }
}

pub async fn update_user(
    input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: UpdateUserInput = parse_input(input)?;

    // Re-hash only when a new password arrives; omission leaves the stored
    // hash untouched.
    let password_hash = match &input.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let account = store
        .update_account(
            input.user_id,
            AccountChanges {
                name: input.name.trim().to_string(),
                email: input.email.trim().to_string(),
                role: input.role,
                address: input.address,
                password_hash,
            },
        )
        .await?;

    to_payload(&account)
}

// ── reads ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerByIdInput {
    pub customer_id: Uuid,
}

impl Validate for CustomerByIdInput {
    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

pub async fn customer_by_id(
    input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: CustomerByIdInput = parse_input(input)?;

    let account = store
        .account_by_id(input.customer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("customer not found"))?;

    to_payload(&account)
}

pub async fn list_customers(
    _input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let customers = store.accounts_by_role(Role::Customer).await?;
    to_payload(&customers)
}

pub async fn list_all_users(
    _input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let accounts = store.all_accounts().await?;
    to_payload(&accounts)
}
