use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{self, Claims};
use crate::config;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

// One message for unknown email, wrong password and unactivated accounts, so
// the login surface leaks nothing about which emails exist.
const BAD_CREDENTIALS: &str = "Invalid email or password";

/// POST /auth/login - verify credentials and issue a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> ApiResult<serde_json::Value> {
    let account = state
        .store
        .account_by_email(input.email.trim())
        .await?
        .ok_or_else(|| ApiError::unauthorized(BAD_CREDENTIALS))?;

    let hash = account
        .password_hash
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized(BAD_CREDENTIALS))?;

    if !auth::verify_password(&input.password, hash) {
        return Err(ApiError::unauthorized(BAD_CREDENTIALS));
    }

    let claims = Claims::new(account.id, account.name.clone(), account.role);
    let token = auth::generate_jwt(&claims)?;
    let expires_in = config::config().security.jwt_expiry_hours * 3600;

    Ok(ApiResponse::success(json!({
        "token": token,
        "expiresIn": expires_in,
        "user": account,
    })))
}
