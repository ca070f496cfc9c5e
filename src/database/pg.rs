use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    Account, AccountChanges, Feedback, NewAccount, NewFeedback, NewRequest, NewVisit, Photo,
    ServiceRequest, Visit, VisitDetail,
};
use super::store::{Store, StoreError};
use crate::identity::Role;

/// PostgreSQL-backed store. Multi-entity mutations run inside a single
/// transaction; dropping the transaction without commit rolls everything
/// back, so no caller ever observes a partially applied unit.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Postgres unique_violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

fn map_insert_conflict(err: sqlx::Error, message: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Conflict(message.to_string())
    } else {
        StoreError::Sqlx(err)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts
                (email, password_hash, name, role, address,
                 activation_token_digest, activation_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.name)
        .bind(new.role.as_str())
        .bind(&new.address)
        .bind(&new.activation_token_digest)
        .bind(new.activation_expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_conflict(e, "email already in use"))
    }

    async fn account_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn account_by_activation_digest(
        &self,
        digest: &str,
    ) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE activation_token_digest = $1",
        )
        .bind(digest)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn update_account(
        &self,
        id: Uuid,
        changes: AccountChanges,
    ) -> Result<Account, StoreError> {
        // COALESCE keeps the stored hash byte-for-byte when no new password
        // was supplied.
        let updated = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET name = $2,
                email = $3,
                role = $4,
                address = $5,
                password_hash = COALESCE($6, password_hash)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(changes.role.as_str())
        .bind(&changes.address)
        .bind(&changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_insert_conflict(e, "email already in use"))?;

        updated.ok_or(StoreError::NotFound("account"))
    }

    async fn activate_account(&self, id: Uuid, password_hash: String) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2,
                activation_token_digest = NULL,
                activation_expires_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("account"));
        }
        Ok(())
    }

    async fn accounts_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError> {
        let accounts =
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE role = $1 ORDER BY name")
                .bind(role.as_str())
                .fetch_all(&self.pool)
                .await?;
        Ok(accounts)
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let accounts = sqlx::query_as::<_, Account>("SELECT * FROM accounts ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    async fn insert_visit(
        &self,
        new: NewVisit,
        photo_urls: Vec<String>,
    ) -> Result<VisitDetail, StoreError> {
        let mut tx = self.pool.begin().await?;

        let visit = sqlx::query_as::<_, Visit>(
            r#"
            INSERT INTO visits (account_id, date, note, signed_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(new.account_id)
        .bind(new.date)
        .bind(&new.note)
        .bind(&new.signed_by)
        .fetch_one(&mut *tx)
        .await?;

        let mut photos = Vec::with_capacity(photo_urls.len());
        for url in &photo_urls {
            let photo = sqlx::query_as::<_, Photo>(
                "INSERT INTO photos (visit_id, url) VALUES ($1, $2) RETURNING *",
            )
            .bind(visit.id)
            .bind(url)
            .fetch_one(&mut *tx)
            .await?;
            photos.push(photo);
        }

        tx.commit().await?;

        Ok(VisitDetail {
            visit,
            photos,
            feedback: None,
        })
    }

    async fn update_visit(
        &self,
        id: Uuid,
        note: String,
        signed_by: String,
        new_photo_urls: Vec<String>,
        photo_ids_to_delete: Vec<Uuid>,
    ) -> Result<VisitDetail, StoreError> {
        let mut tx = self.pool.begin().await?;

        // establish the visit exists before any write
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM visits WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(StoreError::NotFound("visit"));
        }

        // (a) drop the named photos, scoped to this visit so foreign ids are
        // silent no-ops
        if !photo_ids_to_delete.is_empty() {
            sqlx::query("DELETE FROM photos WHERE visit_id = $1 AND id = ANY($2)")
                .bind(id)
                .bind(&photo_ids_to_delete)
                .execute(&mut *tx)
                .await?;
        }

        // (b) attach the new photos
        for url in &new_photo_urls {
            sqlx::query("INSERT INTO photos (visit_id, url) VALUES ($1, $2)")
                .bind(id)
                .bind(url)
                .execute(&mut *tx)
                .await?;
        }

        // (c) rewrite note and signer
        let visit = sqlx::query_as::<_, Visit>(
            "UPDATE visits SET note = $2, signed_by = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&note)
        .bind(&signed_by)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("visit"))?;

        let photos = sqlx::query_as::<_, Photo>(
            "SELECT * FROM photos WHERE visit_id = $1 ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let feedback =
            sqlx::query_as::<_, Feedback>("SELECT * FROM feedback WHERE visit_id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(VisitDetail {
            visit,
            photos,
            feedback,
        })
    }

    async fn delete_visit(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // children first: feedback, then photos, then the visit itself
        sqlx::query("DELETE FROM feedback WHERE visit_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM photos WHERE visit_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM visits WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("visit"));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn visit_by_id(&self, id: Uuid) -> Result<Option<Visit>, StoreError> {
        let visit = sqlx::query_as::<_, Visit>("SELECT * FROM visits WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(visit)
    }

    async fn visit_detail(&self, id: Uuid) -> Result<Option<VisitDetail>, StoreError> {
        let Some(visit) = self.visit_by_id(id).await? else {
            return Ok(None);
        };

        let photos = sqlx::query_as::<_, Photo>(
            "SELECT * FROM photos WHERE visit_id = $1 ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let feedback =
            sqlx::query_as::<_, Feedback>("SELECT * FROM feedback WHERE visit_id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(Some(VisitDetail {
            visit,
            photos,
            feedback,
        }))
    }

    async fn visits_by_account(&self, account_id: Uuid) -> Result<Vec<Visit>, StoreError> {
        let visits = sqlx::query_as::<_, Visit>(
            "SELECT * FROM visits WHERE account_id = $1 ORDER BY date DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(visits)
    }

    async fn visits_on_date(&self, day: NaiveDate) -> Result<Vec<Visit>, StoreError> {
        let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = start + chrono::Duration::days(1);

        let visits = sqlx::query_as::<_, Visit>(
            "SELECT * FROM visits WHERE date >= $1 AND date < $2 ORDER BY date DESC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(visits)
    }

    async fn insert_feedback(&self, new: NewFeedback) -> Result<Feedback, StoreError> {
        sqlx::query_as::<_, Feedback>(
            r#"
            INSERT INTO feedback (visit_id, body, photo_url)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(new.visit_id)
        .bind(&new.body)
        .bind(&new.photo_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_conflict(e, "feedback already submitted for this visit"))
    }

    async fn recent_feedback(&self, limit: i64) -> Result<Vec<Feedback>, StoreError> {
        let rows = sqlx::query_as::<_, Feedback>(
            "SELECT * FROM feedback ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_request(&self, new: NewRequest) -> Result<ServiceRequest, StoreError> {
        let request = sqlx::query_as::<_, ServiceRequest>(
            r#"
            INSERT INTO requests (account_id, title, description, photo_url)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(new.account_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.photo_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(request)
    }

    async fn request_by_id(&self, id: Uuid) -> Result<Option<ServiceRequest>, StoreError> {
        let request =
            sqlx::query_as::<_, ServiceRequest>("SELECT * FROM requests WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(request)
    }

    async fn resolve_request(
        &self,
        id: Uuid,
        resolved_by: String,
    ) -> Result<ServiceRequest, StoreError> {
        let request = sqlx::query_as::<_, ServiceRequest>(
            "UPDATE requests SET resolved_by = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&resolved_by)
        .fetch_optional(&self.pool)
        .await?;

        request.ok_or(StoreError::NotFound("request"))
    }

    async fn requests_all(&self) -> Result<Vec<ServiceRequest>, StoreError> {
        let requests = sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM requests ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    async fn requests_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        let requests = sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM requests WHERE account_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    async fn recent_requests(&self, limit: i64) -> Result<Vec<ServiceRequest>, StoreError> {
        let requests = sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM requests ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }
}
