use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Customer feedback on one visit. At most one per visit; the unique index
/// on visit_id is the duplicate-submission guard.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub body: String,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub visit_id: Uuid,
    pub body: String,
    pub photo_url: Option<String>,
}
