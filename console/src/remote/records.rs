// Remote record store (Postgres).
//
// The `ApplicationRecords` trait is the seam the gateway and API layer talk
// through: production uses the sqlx-backed `RecordStore`, tests use
// deterministic stubs so failure paths can be exercised without a database.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use log::{info, warn};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::models::application::{ApplicationRow, ApplicationStatus};
use crate::models::document::DocumentRecord;
use crate::models::requests::CreateApplicationRequest;
use crate::utils::logging::mask_database_url;

#[async_trait]
pub trait ApplicationRecords: Send + Sync {
    async fn insert_application(&self, req: &CreateApplicationRequest) -> Result<ApplicationRow>;

    async fn fetch_application(&self, id: &str) -> Result<Option<ApplicationRow>>;

    /// The autosave write: replace the blob and bump `updated_at`.
    async fn update_application_data(&self, id: &str, data: &Value) -> Result<()>;

    async fn list_applications(&self) -> Result<Vec<ApplicationRow>>;

    async fn set_status(&self, id: &str, status: ApplicationStatus) -> Result<()>;

    async fn mark_completed(&self, id: &str) -> Result<()>;

    async fn list_documents(&self, merchant_id: &str) -> Result<Vec<DocumentRecord>>;
}

pub struct RecordStore {
    pool: PgPool,
}

impl RecordStore {
    /// Connect with exponential backoff + jitter. Transient startup races
    /// (database still coming up, DNS blips) retry a few times before the
    /// error is surfaced.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let masked = mask_database_url(database_url);
        info!(
            "[PHASE: records] [STEP: connect] Connecting to record store (masked_url={})",
            masked
        );

        let strategy = ExponentialBackoff::from_millis(200)
            .factor(2)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(3);

        let pool = Retry::spawn(strategy, || async {
            PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .connect(database_url)
                .await
        })
        .await
        .with_context(|| format!("Failed to connect to record store ({})", masked))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationRecords for RecordStore {
    async fn insert_application(&self, req: &CreateApplicationRequest) -> Result<ApplicationRow> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let row = sqlx::query_as::<Postgres, ApplicationRow>(
            r#"
            INSERT INTO merchant_applications
                (id, merchant_name, merchant_email, application_data, completed, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, FALSE, $5, NOW(), NOW())
            RETURNING id, merchant_name, merchant_email, application_data, completed, status, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(&req.merchant_name)
        .bind(&req.merchant_email)
        .bind(sqlx::types::Json(serde_json::json!({})))
        .bind(ApplicationStatus::InProgress.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert application")?;
        Ok(row)
    }

    async fn fetch_application(&self, id: &str) -> Result<Option<ApplicationRow>> {
        let row = sqlx::query_as::<Postgres, ApplicationRow>(
            r#"
            SELECT id, merchant_name, merchant_email, application_data, completed, status, created_at, updated_at
            FROM merchant_applications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch application")?;
        Ok(row)
    }

    async fn update_application_data(&self, id: &str, data: &Value) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE merchant_applications
            SET application_data = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(sqlx::types::Json(data))
        .execute(&self.pool)
        .await
        .context("Failed to update application data")?;

        if result.rows_affected() == 0 {
            warn!(
                "[PHASE: records] [STEP: update] No application row matched id={}; save had no effect",
                id
            );
        }
        Ok(())
    }

    async fn list_applications(&self) -> Result<Vec<ApplicationRow>> {
        let rows = sqlx::query_as::<Postgres, ApplicationRow>(
            r#"
            SELECT id, merchant_name, merchant_email, application_data, completed, status, created_at, updated_at
            FROM merchant_applications
            ORDER BY updated_at DESC
            "#,
        )
        .fetch(&self.pool)
        .try_collect()
        .await
        .context("Failed to list applications")?;
        Ok(rows)
    }

    async fn set_status(&self, id: &str, status: ApplicationStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE merchant_applications
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to set application status to {}", status))?;
        Ok(())
    }

    async fn mark_completed(&self, id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE merchant_applications
            SET completed = TRUE, status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(ApplicationStatus::Completed.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to mark application completed")?;
        Ok(())
    }

    async fn list_documents(&self, merchant_id: &str) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query_as::<Postgres, DocumentRecord>(
            r#"
            SELECT id, merchant_id, file_name, file_path, file_type, file_size, document_type, created_at
            FROM merchant_documents
            WHERE merchant_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(merchant_id)
        .fetch(&self.pool)
        .try_collect()
        .await
        .context("Failed to list documents")?;
        Ok(rows)
    }
}
