use axum::body::Bytes;
use axum::extract::State;
use axum::Extension;
use serde_json::json;

use crate::config;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::rpc::access::{self, AccessLevel};
use crate::state::AppState;

/// POST /api/upload - forward image bytes to the image host, return its
/// stable HTTPS URL.
///
/// The upload happens before any mutation references the URL; if the host
/// rejects it the caller gets BAD_GATEWAY and nothing has been written.
pub async fn upload(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> ApiResult<serde_json::Value> {
    access::authorize(AccessLevel::Staff, &identity)?;

    if body.is_empty() {
        return Err(ApiError::bad_request("empty upload body"));
    }

    let max = config::config().api.max_upload_size_bytes;
    if body.len() > max {
        return Err(ApiError::bad_request(format!(
            "upload exceeds {} bytes",
            max
        )));
    }

    let url = state.images.upload(body.to_vec()).await?;

    Ok(ApiResponse::success(json!({ "url": url })))
}
