//! Run Repository
//!
//! Queries against the `run`, `access` and `users` tables. Identifiers are
//! compared as text so the queries work whether the columns are UUID or
//! text typed.

use evolve_core::domain::run::{AccessMode, Run};
use sqlx::PgPool;

/// SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

/// List the runs `user_id` has any access to, newest first
pub async fn list_accessible(pool: &PgPool, user_id: &str) -> Result<Vec<Run>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RunRow>(
        r#"
        SELECT r.id::text AS id, r.name, r.description, r.status, r.type AS run_type,
               r.command, r.createdBy::text AS created_by,
               r.createdAt AS created_at, r.updatedAt AS updated_at
        FROM run r
        JOIN access a ON a.runID::text = r.id::text
        WHERE a.userID::text = $1
        ORDER BY r.createdAt DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Find a run by ID, only if `user_id` has access to it
pub async fn find_accessible(
    pool: &PgPool,
    user_id: &str,
    run_id: &str,
) -> Result<Option<Run>, sqlx::Error> {
    let row = sqlx::query_as::<_, RunRow>(
        r#"
        SELECT r.id::text AS id, r.name, r.description, r.status, r.type AS run_type,
               r.command, r.createdBy::text AS created_by,
               r.createdAt AS created_at, r.updatedAt AS updated_at
        FROM run r
        JOIN access a ON a.runID::text = r.id::text
        WHERE a.userID::text = $1 AND r.id::text = $2
        "#,
    )
    .bind(user_id)
    .bind(run_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Resolve user emails to user IDs; unknown emails are left out
pub async fn find_user_ids_by_email(
    pool: &PgPool,
    emails: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT id::text FROM users WHERE email = ANY($1)")
        .bind(emails)
        .fetch_all(pool)
        .await
}

/// Grant `mode` access on a run to every user, all or nothing
pub async fn grant_access(
    pool: &PgPool,
    run_id: &str,
    user_ids: &[String],
    mode: AccessMode,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for user_id in user_ids {
        sqlx::query(
            r#"
            INSERT INTO access (runID, userID, mode)
            SELECT r.id, u.id, $3
            FROM run r, users u
            WHERE r.id::text = $1 AND u.id::text = $2
            "#,
        )
        .bind(run_id)
        .bind(user_id)
        .bind(mode.as_str())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// Whether a database error is a unique constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    name: String,
    description: String,
    status: String,
    run_type: String,
    command: String,
    created_by: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<RunRow> for Run {
    fn from(row: RunRow) -> Self {
        Run {
            id: row.id,
            name: row.name,
            description: row.description,
            status: row.status,
            run_type: row.run_type,
            command: row.command,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
