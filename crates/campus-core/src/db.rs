use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::records::ValidatedRecord;
use crate::scoring::narrative::ActionPlan;
use crate::scoring::report::GlobalReport;
use crate::store::{RecordStore, ReportStore, REPORTS_COLLECTION};

pub type DbPool = Pool<Postgres>;

/// Establish a new Postgres connection pool. The pool must allow at least one
/// connection per concurrent create in a batch wave.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DbPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .with_context(|| "failed to connect to Postgres")
}

/// Run database migrations embedded at compile-time.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .with_context(|| "failed to run database migrations")
}

/// Document store over the `documents` JSONB table.
#[derive(Clone)]
pub struct PostgresStore {
    pool: DbPool,
}

impl PostgresStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, collection: &str, body: Value) -> Result<String, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
                INSERT INTO documents (id, collection, body)
                VALUES ($1, $2, $3)
            "#,
        )
        .bind(id)
        .bind(collection)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(id.to_string())
    }
}

fn parse_id(id: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(id).map_err(|_| StoreError::NotFound(id.to_string()))
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn create(&self, record: &ValidatedRecord) -> Result<String, StoreError> {
        let body = serde_json::to_value(record)?;
        self.insert(record.kind().collection(), body).await
    }
}

#[async_trait]
impl ReportStore for PostgresStore {
    async fn save(&self, report: &GlobalReport) -> Result<String, StoreError> {
        let body = serde_json::to_value(report)?;
        self.insert(REPORTS_COLLECTION, body).await
    }

    async fn fetch(&self, id: &str) -> Result<GlobalReport, StoreError> {
        let uuid = parse_id(id)?;
        let row = sqlx::query(
            r#"
                SELECT body FROM documents
                WHERE id = $1 AND collection = $2
            "#,
        )
        .bind(uuid)
        .bind(REPORTS_COLLECTION)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let body: Value = row.try_get("body")?;
        Ok(serde_json::from_value(body)?)
    }

    async fn attach_narrative(&self, id: &str, narrative: &ActionPlan) -> Result<(), StoreError> {
        let uuid = parse_id(id)?;
        let result = sqlx::query(
            r#"
                UPDATE documents
                SET body = jsonb_set(body, '{narrative}', $1),
                    updated_at = now()
                WHERE id = $2
                  AND collection = $3
                  AND COALESCE(body -> 'narrative', 'null'::jsonb) = 'null'::jsonb
            "#,
        )
        .bind(serde_json::to_value(narrative)?)
        .bind(uuid)
        .bind(REPORTS_COLLECTION)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM documents WHERE id = $1 AND collection = $2)",
        )
        .bind(uuid)
        .bind(REPORTS_COLLECTION)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            Err(StoreError::NarrativeAlreadyAttached(id.to_string()))
        } else {
            Err(StoreError::NotFound(id.to_string()))
        }
    }
}
