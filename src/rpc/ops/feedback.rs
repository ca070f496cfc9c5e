use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config;
use crate::database::models::NewFeedback;
use crate::database::Store;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::rpc::validate::{self, Validate};
use crate::rpc::{caller_account_id, parse_input, to_payload};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFeedbackInput {
    pub visit_id: Uuid,
    pub feedback: String,
    pub photo_url: Option<String>,
}

impl Validate for SubmitFeedbackInput {
    fn validate(&self) -> Result<(), ApiError> {
        validate::min_len("feedback", &self.feedback, 3)?;
        if let Some(url) = &self.photo_url {
            validate::http_url("photoUrl", url)?;
        }
        Ok(())
    }
}

/// Submit feedback on one of the caller's own visits.
///
/// A visit that does not exist and a visit that belongs to someone else are
/// indistinguishable to the caller (both NOT_FOUND). A second submission for
/// the same visit fails the one-feedback-per-visit constraint (CONFLICT).
pub async fn submit_feedback(
    input: Value,
    identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: SubmitFeedbackInput = parse_input(input)?;
    let account_id = caller_account_id(&identity)?;

    let visit = store
        .visit_by_id(input.visit_id)
        .await?
        .filter(|visit| visit.account_id == account_id)
        .ok_or_else(|| ApiError::not_found("visit not found"))?;

    let feedback = store
        .insert_feedback(NewFeedback {
            visit_id: visit.id,
            body: input.feedback.trim().to_string(),
            photo_url: input.photo_url,
        })
        .await?;

    to_payload(&feedback)
}

/// Newest feedback across all customers, bounded for the dashboard feed.
pub async fn get_recent_feedbacks(
    _input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let limit = config::config().api.recent_feed_limit;
    let feedback = store.recent_feedback(limit).await?;
    to_payload(&feedback)
}
