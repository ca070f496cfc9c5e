use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::Store;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

pub mod access;
pub mod ops;
pub mod validate;

#[cfg(test)]
mod tests;

pub use access::AccessLevel;

/// Operation kind. Queries are safely repeatable; mutations write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Query,
    Mutation,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Query => "query",
            OpKind::Mutation => "mutation",
        }
    }
}

type Handler = fn(Value, Identity, Arc<dyn Store>) -> BoxFuture<'static, Result<Value, ApiError>>;

/// One named remote operation: kind, required access level, handler.
pub struct Operation {
    pub kind: OpKind,
    pub access: AccessLevel,
    handler: Handler,
}

fn op(kind: OpKind, access: AccessLevel, handler: Handler) -> Operation {
    Operation {
        kind,
        access,
        handler,
    }
}

fn entries() -> Vec<(&'static str, Operation)> {
    use access::AccessLevel::{Admin, Authenticated, Public, Staff};
    use OpKind::{Mutation, Query};

    vec![
        // accounts
        ("whoami", op(Query, Authenticated, |i, c, s| Box::pin(ops::accounts::whoami(i, c, s)))),
        ("createCustomer", op(Mutation, Staff, |i, c, s| Box::pin(ops::accounts::create_customer(i, c, s)))),
        ("inviteCustomer", op(Mutation, Staff, |i, c, s| Box::pin(ops::accounts::invite_customer(i, c, s)))),
        ("activateAccount", op(Mutation, Public, |i, c, s| Box::pin(ops::accounts::activate_account(i, c, s)))),
        ("updateUser", op(Mutation, Admin, |i, c, s| Box::pin(ops::accounts::update_user(i, c, s)))),
        ("listCustomers", op(Query, Staff, |i, c, s| Box::pin(ops::accounts::list_customers(i, c, s)))),
        ("customerById", op(Query, Staff, |i, c, s| Box::pin(ops::accounts::customer_by_id(i, c, s)))),
        ("listAllUsers", op(Query, Admin, |i, c, s| Box::pin(ops::accounts::list_all_users(i, c, s)))),
        // visits
        ("createVisit", op(Mutation, Staff, |i, c, s| Box::pin(ops::visits::create_visit(i, c, s)))),
        ("updateVisit", op(Mutation, Admin, |i, c, s| Box::pin(ops::visits::update_visit(i, c, s)))),
        ("deleteVisit", op(Mutation, Admin, |i, c, s| Box::pin(ops::visits::delete_visit(i, c, s)))),
        ("getVisits", op(Query, Authenticated, |i, c, s| Box::pin(ops::visits::get_visits(i, c, s)))),
        ("getVisitById", op(Query, Staff, |i, c, s| Box::pin(ops::visits::get_visit_by_id(i, c, s)))),
        ("visitsByCustomer", op(Query, Staff, |i, c, s| Box::pin(ops::visits::visits_by_customer(i, c, s)))),
        ("visitsByDate", op(Query, Staff, |i, c, s| Box::pin(ops::visits::visits_by_date(i, c, s)))),
        // feedback
        ("submitFeedback", op(Mutation, Authenticated, |i, c, s| Box::pin(ops::feedback::submit_feedback(i, c, s)))),
        ("getRecentFeedbacks", op(Query, Staff, |i, c, s| Box::pin(ops::feedback::get_recent_feedbacks(i, c, s)))),
        // requests
        ("createRequest", op(Mutation, Authenticated, |i, c, s| Box::pin(ops::requests::create_request(i, c, s)))),
        ("resolveRequest", op(Mutation, Authenticated, |i, c, s| Box::pin(ops::requests::resolve_request(i, c, s)))),
        ("getRequests", op(Query, Staff, |i, c, s| Box::pin(ops::requests::get_requests(i, c, s)))),
        ("getRequestsByCustomer", op(Query, Authenticated, |i, c, s| Box::pin(ops::requests::get_requests_by_customer(i, c, s)))),
        ("getRecentRequests", op(Query, Staff, |i, c, s| Box::pin(ops::requests::get_recent_requests(i, c, s)))),
    ]
}

static REGISTRY: Lazy<HashMap<&'static str, Operation>> =
    Lazy::new(|| entries().into_iter().collect());

/// Operation catalogue for the service banner: (name, kind), sorted by name.
pub fn catalogue() -> Vec<(&'static str, &'static str)> {
    let mut names: Vec<_> = REGISTRY
        .iter()
        .map(|(name, operation)| (*name, operation.kind.as_str()))
        .collect();
    names.sort();
    names
}

/// Dispatch one call: registry lookup, guard chain, handler.
///
/// Guards run before input validation; validation runs at the top of every
/// handler before any storage access. A failure at any step short-circuits
/// with no side effects.
pub async fn dispatch(
    store: Arc<dyn Store>,
    identity: Identity,
    operation: &str,
    input: Value,
) -> Result<Value, ApiError> {
    let entry = REGISTRY
        .get(operation)
        .ok_or_else(|| ApiError::not_found(format!("unknown operation: {}", operation)))?;

    access::authorize(entry.access, &identity)?;

    (entry.handler)(input, identity, store).await
}

/// POST /api/rpc/:operation
pub async fn rpc_entry(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(operation): Path<String>,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    let input = body.map(|Json(v)| v).unwrap_or_else(|| json!({}));
    let data = dispatch(state.store.clone(), identity, &operation, input).await?;
    Ok(ApiResponse::success(data))
}

/// Deserialize and validate a handler's input.
pub(crate) fn parse_input<T>(raw: Value) -> Result<T, ApiError>
where
    T: serde::de::DeserializeOwned + validate::Validate,
{
    let input: T = serde_json::from_value(raw)
        .map_err(|e| ApiError::bad_request(format!("invalid input: {}", e)))?;
    input.validate()?;
    Ok(input)
}

/// Serialize a handler result into the wire payload.
pub(crate) fn to_payload<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!("failed to serialize payload: {}", e);
        ApiError::internal("Failed to format response")
    })
}

/// Account id of the caller. Guards guarantee this for authenticated
/// operations; the error is a backstop, not a reachable path.
pub(crate) fn caller_account_id(identity: &Identity) -> Result<Uuid, ApiError> {
    identity
        .account_id()
        .ok_or_else(|| ApiError::unauthorized("Sign in to continue"))
}
