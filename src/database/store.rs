use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use super::models::{
    Account, AccountChanges, Feedback, NewAccount, NewFeedback, NewRequest, NewVisit,
    ServiceRequest, Visit, VisitDetail,
};

/// Errors from the storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Everything the operation handlers need from storage.
///
/// The multi-entity mutations (`insert_visit`, `update_visit`,
/// `delete_visit`) are each one atomic unit: all constituent writes succeed
/// or none are observable. Single-row operations rely on the database's own
/// constraints (unique email, unique feedback per visit) and surface
/// violations as `Conflict`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;

    // ── accounts ──────────────────────────────────────────────────────

    /// Fails with `Conflict` if the email is already held by any account.
    async fn insert_account(&self, new: NewAccount) -> Result<Account, StoreError>;

    async fn account_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn account_by_activation_digest(
        &self,
        digest: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// Full update. `Conflict` if the new email belongs to a different
    /// account; a `None` password hash leaves the stored hash untouched.
    async fn update_account(
        &self,
        id: Uuid,
        changes: AccountChanges,
    ) -> Result<Account, StoreError>;

    /// Set the password hash and clear the activation token so it cannot be
    /// replayed.
    async fn activate_account(&self, id: Uuid, password_hash: String) -> Result<(), StoreError>;

    /// Accounts with the given role, ordered by name.
    async fn accounts_by_role(&self, role: crate::identity::Role)
        -> Result<Vec<Account>, StoreError>;

    /// Every account, ordered by name.
    async fn all_accounts(&self) -> Result<Vec<Account>, StoreError>;

    // ── visits ────────────────────────────────────────────────────────

    /// Create a visit and one photo row per URL as one atomic unit.
    async fn insert_visit(
        &self,
        new: NewVisit,
        photo_urls: Vec<String>,
    ) -> Result<VisitDetail, StoreError>;

    /// Atomically: delete the listed photos that belong to this visit (ids
    /// belonging to other visits are ignored), insert photo rows for the new
    /// URLs, and update note and signer. `NotFound` if the visit is absent.
    async fn update_visit(
        &self,
        id: Uuid,
        note: String,
        signed_by: String,
        new_photo_urls: Vec<String>,
        photo_ids_to_delete: Vec<Uuid>,
    ) -> Result<VisitDetail, StoreError>;

    /// Atomically delete the visit's feedback, its photos, then the visit
    /// itself, in that dependency order. `NotFound` if the visit is absent.
    async fn delete_visit(&self, id: Uuid) -> Result<(), StoreError>;

    async fn visit_by_id(&self, id: Uuid) -> Result<Option<Visit>, StoreError>;

    /// Visit with photos and feedback attached.
    async fn visit_detail(&self, id: Uuid) -> Result<Option<VisitDetail>, StoreError>;

    /// One customer's visits, most recent first.
    async fn visits_by_account(&self, account_id: Uuid) -> Result<Vec<Visit>, StoreError>;

    /// Visits on one UTC calendar day, most recent first.
    async fn visits_on_date(&self, day: NaiveDate) -> Result<Vec<Visit>, StoreError>;

    // ── feedback ──────────────────────────────────────────────────────

    /// Fails with `Conflict` if the visit already has feedback.
    async fn insert_feedback(&self, new: NewFeedback) -> Result<Feedback, StoreError>;

    /// Newest feedback rows, bounded.
    async fn recent_feedback(&self, limit: i64) -> Result<Vec<Feedback>, StoreError>;

    // ── requests ──────────────────────────────────────────────────────

    async fn insert_request(&self, new: NewRequest) -> Result<ServiceRequest, StoreError>;

    async fn request_by_id(&self, id: Uuid) -> Result<Option<ServiceRequest>, StoreError>;

    /// Overwrite `resolved_by` (last-write-wins). `NotFound` if absent.
    async fn resolve_request(
        &self,
        id: Uuid,
        resolved_by: String,
    ) -> Result<ServiceRequest, StoreError>;

    /// All requests, newest first.
    async fn requests_all(&self) -> Result<Vec<ServiceRequest>, StoreError>;

    /// One customer's requests, newest first.
    async fn requests_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ServiceRequest>, StoreError>;

    /// Newest requests, bounded.
    async fn recent_requests(&self, limit: i64) -> Result<Vec<ServiceRequest>, StoreError>;
}
