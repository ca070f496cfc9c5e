use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::feedback::Feedback;

/// A recorded service event for one customer account.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: Uuid,
    pub account_id: Uuid,
    pub date: DateTime<Utc>,
    pub note: String,
    /// Display name of the staff member who recorded the visit. Rewritten to
    /// "<editor> (Edited)" on admin edit.
    pub signed_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// A visit with its owned children, as returned to edit/detail views.
#[derive(Debug, Clone, Serialize)]
pub struct VisitDetail {
    #[serde(flatten)]
    pub visit: Visit,
    pub photos: Vec<Photo>,
    pub feedback: Option<Feedback>,
}

#[derive(Debug, Clone)]
pub struct NewVisit {
    pub account_id: Uuid,
    pub date: DateTime<Utc>,
    pub note: String,
    pub signed_by: String,
}
