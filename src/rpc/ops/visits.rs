use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::NewVisit;
use crate::database::Store;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::rpc::validate::{self, Validate};
use crate::rpc::{caller_account_id, parse_input, to_payload};

// ── createVisit ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisitInput {
    pub customer_id: Uuid,
    pub note: String,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    pub date: Option<DateTime<Utc>>,
}

impl Validate for CreateVisitInput {
    fn validate(&self) -> Result<(), ApiError> {
        validate::min_len("note", &self.note, 2)?;
        validate::http_urls("photoUrls", &self.photo_urls)?;
        Ok(())
    }
}

/// Create a visit for a customer, signed with the caller's name, together
/// with one photo row per supplied URL — one atomic unit.
pub async fn create_visit(
    input: Value,
    identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: CreateVisitInput = parse_input(input)?;

    let customer = store
        .account_by_id(input.customer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("customer not found"))?;

    let detail = store
        .insert_visit(
            NewVisit {
                account_id: customer.id,
                date: input.date.unwrap_or_else(Utc::now),
                note: input.note.trim().to_string(),
                signed_by: identity.display_name().to_string(),
            },
            input.photo_urls,
        )
        .await?;

    to_payload(&detail)
}

// ── updateVisit ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVisitInput {
    pub visit_id: Uuid,
    pub note: String,
    #[serde(default)]
    pub new_photo_urls: Vec<String>,
    #[serde(default)]
    pub photo_ids_to_delete: Vec<Uuid>,
}

impl Validate for UpdateVisitInput {
    fn validate(&self) -> Result<(), ApiError> {
        validate::min_len("note", &self.note, 2)?;
        validate::http_urls("newPhotoUrls", &self.new_photo_urls)?;
        Ok(())
    }
}

/// Atomically delete the named photos, attach the new ones, and rewrite the
/// note; the signer becomes "<caller> (Edited)". Photo ids that belong to a
/// different visit are ignored.
pub async fn update_visit(
    input: Value,
    identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: UpdateVisitInput = parse_input(input)?;

    let signed_by = format!("{} (Edited)", identity.display_name());
    let detail = store
        .update_visit(
            input.visit_id,
            input.note.trim().to_string(),
            signed_by,
            input.new_photo_urls,
            input.photo_ids_to_delete,
        )
        .await?;

    to_payload(&detail)
}

// ── deleteVisit ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVisitInput {
    pub visit_id: Uuid,
}

impl Validate for DeleteVisitInput {
    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Delete a visit and everything it owns: feedback first, then photos, then
/// the visit row, as one atomic unit.
pub async fn delete_visit(
    input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: DeleteVisitInput = parse_input(input)?;

    store.delete_visit(input.visit_id).await?;

    Ok(serde_json::json!({ "deleted": true }))
}

// ── reads ─────────────────────────────────────────────────────────────

/// The caller's own visit history, most recent first.
pub async fn get_visits(
    _input: Value,
    identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let account_id = caller_account_id(&identity)?;
    let visits = store.visits_by_account(account_id).await?;
    to_payload(&visits)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetVisitByIdInput {
    pub visit_id: Uuid,
}

impl Validate for GetVisitByIdInput {
    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

pub async fn get_visit_by_id(
    input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: GetVisitByIdInput = parse_input(input)?;

    let detail = store
        .visit_detail(input.visit_id)
        .await?
        .ok_or_else(|| ApiError::not_found("visit not found"))?;

    to_payload(&detail)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitsByCustomerInput {
    pub customer_id: Uuid,
}

impl Validate for VisitsByCustomerInput {
    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

pub async fn visits_by_customer(
    input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: VisitsByCustomerInput = parse_input(input)?;
    let visits = store.visits_by_account(input.customer_id).await?;
    to_payload(&visits)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitsByDateInput {
    /// UTC calendar day, YYYY-MM-DD.
    pub date: NaiveDate,
}

impl Validate for VisitsByDateInput {
    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

pub async fn visits_by_date(
    input: Value,
    _identity: Identity,
    store: Arc<dyn Store>,
) -> Result<Value, ApiError> {
    let input: VisitsByDateInput = parse_input(input)?;
    let visits = store.visits_on_date(input.date).await?;
    to_payload(&visits)
}
