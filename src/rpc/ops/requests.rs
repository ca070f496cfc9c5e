use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config;
use crate::database::models::NewRequest;
use crate::database::Store;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::rpc::validate::{self, Validate};
use crate::rpc::{caller_account_id, parse_input, to_payload};

// ── createRequest ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestInput {
    pub title: String,
    pub description: String,
    pub photo_url: Option<String>,
}

impl Validate for CreateRequestInput {
    fn validate(&self) -> Result<(), ApiError> {
        validate::min_len("title", &self.title, 3)?;
        validate::min_len("description", &self.description, 5)?;
        if let Some(url) = &self.photo_url {
            validate::http_url("photoUrl", url)?;
        }
        Ok(())
    }
}

pub async fn create_request(
    input: Value,
    identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: CreateRequestInput = parse_input(input)?;
    let account_id = caller_account_id(&identity)?;

    let request = store
        .insert_request(NewRequest {
            account_id,
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            photo_url: input.photo_url,
        })
        .await?;

    to_payload(&request)
}

// ── resolveRequest ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequestInput {
    pub request_id: Uuid,
}

impl Validate for ResolveRequestInput {
    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Mark a request resolved by the caller.
///
/// Staff may resolve any request; a customer only their own. Re-resolution
/// is not blocked: any eligible caller overwrites resolved_by
/// (last-write-wins).
pub async fn resolve_request(
    input: Value,
    identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: ResolveRequestInput = parse_input(input)?;

    let request = store
        .request_by_id(input.request_id)
        .await?
        .ok_or_else(|| ApiError::not_found("request not found"))?;

    let is_owner = identity.account_id() == Some(request.account_id);
    if !identity.is_staff() && !is_owner {
        return Err(ApiError::forbidden("You may only resolve your own requests"));
    }

    let resolved = store
        .resolve_request(request.id, identity.display_name().to_string())
        .await?;

    to_payload(&resolved)
}

// ── reads ─────────────────────────────────────────────────────────────

pub async fn get_requests(
    _input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let requests = store.requests_all().await?;
    to_payload(&requests)
}

/// The caller's own requests, newest first.
pub async fn get_requests_by_customer(
    _input: Value,
    identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let account_id = caller_account_id(&identity)?;
    let requests = store.requests_by_account(account_id).await?;
    to_payload(&requests)
}

/// Newest requests, bounded for the dashboard feed.
pub async fn get_recent_requests(
    _input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let limit = config::config().api.recent_feed_limit;
    let requests = store.recent_requests(limit).await?;
    to_payload(&requests)
}
