//! Test utilities: an in-memory `Store` with the same observable contract as
//! the Postgres implementation, plus entity fixtures.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::database::models::{
    Account, AccountChanges, Feedback, NewAccount, NewFeedback, NewRequest, NewVisit, Photo,
    ServiceRequest, Visit, VisitDetail,
};
use crate::database::store::{Store, StoreError};
use crate::identity::{Identity, Role};

#[derive(Debug, Default, Clone)]
struct MemState {
    accounts: Vec<Account>,
    visits: Vec<Visit>,
    photos: Vec<Photo>,
    feedback: Vec<Feedback>,
    requests: Vec<ServiceRequest>,
}

/// In-memory store. Multi-entity mutations apply to a clone of the state and
/// swap it in on success, so an injected mid-unit failure leaves the
/// original state untouched - the same all-or-nothing contract the Postgres
/// transactions give.
pub struct MemStore {
    state: Mutex<MemState>,
    fail_photo_writes: AtomicBool,
    seq: AtomicI64,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemState::default()),
            fail_photo_writes: AtomicBool::new(false),
            seq: AtomicI64::new(0),
        }
    }

    /// Make every photo write fail, to exercise rollback paths.
    pub fn fail_photo_writes(&self, fail: bool) {
        self.fail_photo_writes.store(fail, Ordering::SeqCst);
    }

    /// Monotonic timestamps keep time-ordered assertions deterministic even
    /// when inserts land within the same clock tick.
    fn stamp(&self) -> DateTime<Utc> {
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        Utc::now() + Duration::microseconds(n)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
        self.state.lock().expect("mem store poisoned")
    }

    // ── fixtures ──────────────────────────────────────────────────────

    pub fn seed_account(&self, name: &str, email: &str, role: Role) -> Account {
        self.seed_account_with_password(name, email, role, "password123")
    }

    pub fn seed_account_with_password(
        &self,
        name: &str,
        email: &str,
        role: Role,
        password: &str,
    ) -> Account {
        // Minimum cost keeps fixtures fast
        let hash = bcrypt::hash(password, 4).expect("bcrypt fixture hash");
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: Some(hash),
            name: name.to_string(),
            role,
            address: None,
            activation_token_digest: None,
            activation_expires_at: None,
            created_at: self.stamp(),
        };
        self.lock().accounts.push(account.clone());
        account
    }

    pub fn seed_visit(&self, account_id: Uuid, note: &str) -> Visit {
        let visit = Visit {
            id: Uuid::new_v4(),
            account_id,
            date: self.stamp(),
            note: note.to_string(),
            signed_by: "Alice".to_string(),
            created_at: self.stamp(),
        };
        self.lock().visits.push(visit.clone());
        visit
    }

    pub fn seed_photo(&self, visit_id: Uuid, url: &str) -> Photo {
        let photo = Photo {
            id: Uuid::new_v4(),
            visit_id,
            url: url.to_string(),
            created_at: self.stamp(),
        };
        self.lock().photos.push(photo.clone());
        photo
    }

    pub fn seed_feedback(&self, visit_id: Uuid, body: &str) -> Feedback {
        let feedback = Feedback {
            id: Uuid::new_v4(),
            visit_id,
            body: body.to_string(),
            photo_url: None,
            created_at: self.stamp(),
        };
        self.lock().feedback.push(feedback.clone());
        feedback
    }

    pub fn seed_request(&self, account_id: Uuid, title: &str) -> ServiceRequest {
        let request = ServiceRequest {
            id: Uuid::new_v4(),
            account_id,
            title: title.to_string(),
            description: "seeded request".to_string(),
            photo_url: None,
            resolved_by: None,
            created_at: self.stamp(),
        };
        self.lock().requests.push(request.clone());
        request
    }

    pub fn identity_of(account: &Account) -> Identity {
        Identity::Known {
            account_id: account.id,
            name: account.name.clone(),
            role: account.role,
        }
    }
}

fn detail_from(state: &MemState, visit: Visit) -> VisitDetail {
    let mut photos: Vec<Photo> = state
        .photos
        .iter()
        .filter(|p| p.visit_id == visit.id)
        .cloned()
        .collect();
    photos.sort_by_key(|p| p.created_at);

    let feedback = state
        .feedback
        .iter()
        .find(|f| f.visit_id == visit.id)
        .cloned();

    VisitDetail {
        visit,
        photos,
        feedback,
    }
}

#[async_trait]
impl Store for MemStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        let mut state = self.lock();
        if state.accounts.iter().any(|a| a.email == new.email) {
            return Err(StoreError::Conflict("email already in use".to_string()));
        }

        let account = Account {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            name: new.name,
            role: new.role,
            address: new.address,
            activation_token_digest: new.activation_token_digest,
            activation_expires_at: new.activation_expires_at,
            created_at: self.stamp(),
        };
        state.accounts.push(account.clone());
        Ok(account)
    }

    async fn account_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.lock().accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .lock()
            .accounts
            .iter()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn account_by_activation_digest(
        &self,
        digest: &str,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .lock()
            .accounts
            .iter()
            .find(|a| a.activation_token_digest.as_deref() == Some(digest))
            .cloned())
    }

    async fn update_account(
        &self,
        id: Uuid,
        changes: AccountChanges,
    ) -> Result<Account, StoreError> {
        let mut state = self.lock();

        if state
            .accounts
            .iter()
            .any(|a| a.id != id && a.email == changes.email)
        {
            return Err(StoreError::Conflict("email already in use".to_string()));
        }

        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound("account"))?;

        account.name = changes.name;
        account.email = changes.email;
        account.role = changes.role;
        account.address = changes.address;
        if let Some(hash) = changes.password_hash {
            account.password_hash = Some(hash);
        }

        Ok(account.clone())
    }

    async fn activate_account(&self, id: Uuid, password_hash: String) -> Result<(), StoreError> {
        let mut state = self.lock();
        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound("account"))?;

        account.password_hash = Some(password_hash);
        account.activation_token_digest = None;
        account.activation_expires_at = None;
        Ok(())
    }

    async fn accounts_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError> {
        let mut accounts: Vec<Account> = self
            .lock()
            .accounts
            .iter()
            .filter(|a| a.role == role)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(accounts)
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let mut accounts = self.lock().accounts.clone();
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(accounts)
    }

    async fn insert_visit(
        &self,
        new: NewVisit,
        photo_urls: Vec<String>,
    ) -> Result<VisitDetail, StoreError> {
        let mut state = self.lock();
        let mut draft = state.clone();

        let visit = Visit {
            id: Uuid::new_v4(),
            account_id: new.account_id,
            date: new.date,
            note: new.note,
            signed_by: new.signed_by,
            created_at: self.stamp(),
        };
        draft.visits.push(visit.clone());

        for url in photo_urls {
            if self.fail_photo_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("injected photo write failure".into()));
            }
            draft.photos.push(Photo {
                id: Uuid::new_v4(),
                visit_id: visit.id,
                url,
                created_at: self.stamp(),
            });
        }

        let detail = detail_from(&draft, visit);
        *state = draft;
        Ok(detail)
    }

    async fn update_visit(
        &self,
        id: Uuid,
        note: String,
        signed_by: String,
        new_photo_urls: Vec<String>,
        photo_ids_to_delete: Vec<Uuid>,
    ) -> Result<VisitDetail, StoreError> {
        let mut state = self.lock();
        let mut draft = state.clone();

        if !draft.visits.iter().any(|v| v.id == id) {
            return Err(StoreError::NotFound("visit"));
        }

        // scoped delete: ids on other visits are silent no-ops
        draft
            .photos
            .retain(|p| !(p.visit_id == id && photo_ids_to_delete.contains(&p.id)));

        for url in new_photo_urls {
            if self.fail_photo_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("injected photo write failure".into()));
            }
            draft.photos.push(Photo {
                id: Uuid::new_v4(),
                visit_id: id,
                url,
                created_at: self.stamp(),
            });
        }

        let visit = draft
            .visits
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(StoreError::NotFound("visit"))?;
        visit.note = note;
        visit.signed_by = signed_by;
        let visit = visit.clone();

        let detail = detail_from(&draft, visit);
        *state = draft;
        Ok(detail)
    }

    async fn delete_visit(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.lock();
        let mut draft = state.clone();

        if !draft.visits.iter().any(|v| v.id == id) {
            return Err(StoreError::NotFound("visit"));
        }

        draft.feedback.retain(|f| f.visit_id != id);
        draft.photos.retain(|p| p.visit_id != id);
        draft.visits.retain(|v| v.id != id);

        *state = draft;
        Ok(())
    }

    async fn visit_by_id(&self, id: Uuid) -> Result<Option<Visit>, StoreError> {
        Ok(self.lock().visits.iter().find(|v| v.id == id).cloned())
    }

    async fn visit_detail(&self, id: Uuid) -> Result<Option<VisitDetail>, StoreError> {
        let state = self.lock();
        Ok(state
            .visits
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .map(|visit| detail_from(&state, visit)))
    }

    async fn visits_by_account(&self, account_id: Uuid) -> Result<Vec<Visit>, StoreError> {
        let mut visits: Vec<Visit> = self
            .lock()
            .visits
            .iter()
            .filter(|v| v.account_id == account_id)
            .cloned()
            .collect();
        visits.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(visits)
    }

    async fn visits_on_date(&self, day: NaiveDate) -> Result<Vec<Visit>, StoreError> {
        let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = start + Duration::days(1);

        let mut visits: Vec<Visit> = self
            .lock()
            .visits
            .iter()
            .filter(|v| v.date >= start && v.date < end)
            .cloned()
            .collect();
        visits.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(visits)
    }

    async fn insert_feedback(&self, new: NewFeedback) -> Result<Feedback, StoreError> {
        let mut state = self.lock();
        if state.feedback.iter().any(|f| f.visit_id == new.visit_id) {
            return Err(StoreError::Conflict(
                "feedback already submitted for this visit".to_string(),
            ));
        }

        let feedback = Feedback {
            id: Uuid::new_v4(),
            visit_id: new.visit_id,
            body: new.body,
            photo_url: new.photo_url,
            created_at: self.stamp(),
        };
        state.feedback.push(feedback.clone());
        Ok(feedback)
    }

    async fn recent_feedback(&self, limit: i64) -> Result<Vec<Feedback>, StoreError> {
        let mut rows = self.lock().feedback.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn insert_request(&self, new: NewRequest) -> Result<ServiceRequest, StoreError> {
        let request = ServiceRequest {
            id: Uuid::new_v4(),
            account_id: new.account_id,
            title: new.title,
            description: new.description,
            photo_url: new.photo_url,
            resolved_by: None,
            created_at: self.stamp(),
        };
        self.lock().requests.push(request.clone());
        Ok(request)
    }

    async fn request_by_id(&self, id: Uuid) -> Result<Option<ServiceRequest>, StoreError> {
        Ok(self.lock().requests.iter().find(|r| r.id == id).cloned())
    }

    async fn resolve_request(
        &self,
        id: Uuid,
        resolved_by: String,
    ) -> Result<ServiceRequest, StoreError> {
        let mut state = self.lock();
        let request = state
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound("request"))?;

        request.resolved_by = Some(resolved_by);
        Ok(request.clone())
    }

    async fn requests_all(&self) -> Result<Vec<ServiceRequest>, StoreError> {
        let mut requests = self.lock().requests.clone();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn requests_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        let mut requests: Vec<ServiceRequest> = self
            .lock()
            .requests
            .iter()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn recent_requests(&self, limit: i64) -> Result<Vec<ServiceRequest>, StoreError> {
        let mut requests = self.lock().requests.clone();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests.truncate(limit.max(0) as usize);
        Ok(requests)
    }
}
