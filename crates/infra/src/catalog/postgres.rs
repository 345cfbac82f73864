//! Postgres-backed repository catalog.
//!
//! ## Error Mapping
//!
//! Every SQLx error (connectivity, pool exhaustion, constraint violation) maps
//! to `CatalogError::Unavailable` carrying the operation name. Rows that hold
//! values the gateway cannot interpret map to `CatalogError::InvalidRecord`.
//!
//! ## Thread Safety
//!
//! `PostgresCatalog` is `Send + Sync` and cheap to clone. The pool is created
//! once at startup; each query acquires a connection for its own duration.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;

use regauth_auth::{
    CatalogError, ProjectRepositoryRelation, RelationStatus, RepositoryCatalog, RepositoryRecord,
    Visibility,
};
use regauth_core::{ProjectName, RepositoryName};

use crate::config::DatabaseConfig;

#[derive(Debug, Clone)]
pub struct PostgresCatalog {
    pool: Arc<PgPool>,
}

impl PostgresCatalog {
    /// Wrap an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Build the shared pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, CatalogError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(config.url.expose())
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        tracing::info!(max_connections = config.max_connections, "catalog pool ready");
        Ok(Self::new(pool))
    }
}

#[async_trait::async_trait]
impl RepositoryCatalog for PostgresCatalog {
    #[instrument(skip_all, fields(repository = %repository), err)]
    async fn visibility(
        &self,
        repository: &RepositoryName,
    ) -> Result<Option<RepositoryRecord>, CatalogError> {
        let row = sqlx::query("SELECT repo_name, visibility FROM repo WHERE repo_name = $1")
            .bind(repository.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("visibility", e))?;

        row.as_ref().map(repository_from_row).transpose()
    }

    #[instrument(skip_all, fields(project = %project), err)]
    async fn repositories_for_project(
        &self,
        project: &ProjectName,
    ) -> Result<BTreeSet<RepositoryName>, CatalogError> {
        let rows = sqlx::query("SELECT repo_name FROM rel WHERE project_name = $1 AND status = $2")
            .bind(project.as_str())
            .bind(RelationStatus::Exists.as_str())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("repositories_for_project", e))?;

        rows.iter()
            .map(|row| {
                let name: String = column(row, "repo_name")?;
                parse_record(&name, "repo_name")
            })
            .collect()
    }

    #[instrument(skip_all, fields(project = %project), err)]
    async fn relations_for_project(
        &self,
        project: &ProjectName,
    ) -> Result<Vec<ProjectRepositoryRelation>, CatalogError> {
        let rows = sqlx::query(
            r#"
            SELECT project_name, repo_name, status, updated_at
            FROM rel
            WHERE project_name = $1
            ORDER BY repo_name ASC
            "#,
        )
        .bind(project.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("relations_for_project", e))?;

        rows.iter().map(relation_from_row).collect()
    }

    #[instrument(skip_all, fields(repository = %repository, visibility = %visibility), err)]
    async fn register_repository(
        &self,
        repository: &RepositoryName,
        visibility: Visibility,
    ) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            INSERT INTO repo (repo_name, visibility)
            VALUES ($1, $2)
            ON CONFLICT (repo_name)
            DO UPDATE SET visibility = EXCLUDED.visibility
            "#,
        )
        .bind(repository.as_str())
        .bind(visibility.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("register_repository", e))?;

        Ok(())
    }

    #[instrument(skip_all, fields(project = %project, repository = %repository), err)]
    async fn link_project_repository(
        &self,
        project: &ProjectName,
        repository: &RepositoryName,
    ) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            INSERT INTO rel (project_name, repo_name, status, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (project_name, repo_name)
            DO UPDATE SET
                status = EXCLUDED.status,
                updated_at = NOW()
            "#,
        )
        .bind(project.as_str())
        .bind(repository.as_str())
        .bind(RelationStatus::Exists.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("link_project_repository", e))?;

        Ok(())
    }

    #[instrument(skip_all, fields(project = %project, repository = %repository), err)]
    async fn unlink_project_repository(
        &self,
        project: &ProjectName,
        repository: &RepositoryName,
    ) -> Result<(), CatalogError> {
        let result = sqlx::query(
            r#"
            UPDATE rel
            SET status = $3, updated_at = NOW()
            WHERE project_name = $1 AND repo_name = $2
            "#,
        )
        .bind(project.as_str())
        .bind(repository.as_str())
        .bind(RelationStatus::NonExistent.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("unlink_project_repository", e))?;

        if result.rows_affected() == 0 {
            tracing::debug!("no relation to unlink");
        }
        Ok(())
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, CatalogError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| CatalogError::InvalidRecord(format!("failed to read column {name}: {e}")))
}

fn parse_record<T>(raw: &str, name: &str) -> Result<T, CatalogError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| CatalogError::InvalidRecord(format!("column {name} holds '{raw}': {e}")))
}

fn repository_from_row(row: &PgRow) -> Result<RepositoryRecord, CatalogError> {
    let name: String = column(row, "repo_name")?;
    let visibility: String = column(row, "visibility")?;

    Ok(RepositoryRecord {
        name: parse_record(&name, "repo_name")?,
        visibility: parse_record(&visibility, "visibility")?,
    })
}

fn relation_from_row(row: &PgRow) -> Result<ProjectRepositoryRelation, CatalogError> {
    let project: String = column(row, "project_name")?;
    let repository: String = column(row, "repo_name")?;
    let status: String = column(row, "status")?;
    let updated_at: DateTime<Utc> = column(row, "updated_at")?;

    Ok(ProjectRepositoryRelation {
        project: parse_record(&project, "project_name")?,
        repository: parse_record(&repository, "repo_name")?,
        status: parse_record(&status, "status")?,
        updated_at,
    })
}

/// Map SQLx errors to `CatalogError`.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> CatalogError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            CatalogError::unavailable(
                operation,
                format!("database error [{code}]: {}", db_err.message()),
            )
        }
        sqlx::Error::PoolTimedOut => CatalogError::unavailable(operation, "timed out acquiring a connection"),
        sqlx::Error::PoolClosed => CatalogError::unavailable(operation, "connection pool closed"),
        other => CatalogError::unavailable(operation, other.to_string()),
    }
}
