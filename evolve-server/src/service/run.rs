//! Run Service
//!
//! Business logic for run metadata: listing, lookup and sharing.

use evolve_core::domain::run::{AccessMode, Run, RunId};
use evolve_core::dto::run::{RunSummary, ShareRunRequest};
use sqlx::PgPool;

use crate::repository::run_repository;

/// Service error type
#[derive(Debug)]
pub enum RunError {
    /// Unknown run, or one the caller cannot see
    NotFound,
    ValidationError(String),
    /// Some of the emails do not belong to any user
    UnknownUsers,
    /// At least one user already has access to the run
    AlreadyShared,
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for RunError {
    fn from(err: sqlx::Error) -> Self {
        RunError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, RunError>;

/// List the runs a user created or was given access to
pub async fn list_runs(pool: &PgPool, user_id: &str) -> Result<Vec<RunSummary>> {
    let runs = run_repository::list_accessible(pool, user_id).await?;

    Ok(runs
        .into_iter()
        .map(|run| RunSummary::for_user(run, user_id))
        .collect())
}

/// Get a run the user has access to
pub async fn get_run(pool: &PgPool, user_id: &str, run_id: &str) -> Result<Run> {
    let run_id = parse_run_id(run_id)?;

    run_repository::find_accessible(pool, user_id, run_id.as_str())
        .await?
        .ok_or(RunError::NotFound)
}

/// Grant read access on a run to a list of users identified by email
///
/// The caller must be able to see the run. Either every user gets access
/// or none does.
pub async fn share_run(pool: &PgPool, user_id: &str, req: ShareRunRequest) -> Result<()> {
    let (run_id, emails) = validate_share_request(req)?;

    run_repository::find_accessible(pool, user_id, run_id.as_str())
        .await?
        .ok_or(RunError::NotFound)?;

    let user_ids = run_repository::find_user_ids_by_email(pool, &emails).await?;
    if user_ids.len() != emails.len() {
        return Err(RunError::UnknownUsers);
    }

    run_repository::grant_access(pool, run_id.as_str(), &user_ids, AccessMode::Read)
        .await
        .map_err(|err| {
            if run_repository::is_unique_violation(&err) {
                RunError::AlreadyShared
            } else {
                RunError::DatabaseError(err)
            }
        })?;

    tracing::info!("Run {} shared with {} user(s)", run_id, user_ids.len());

    Ok(())
}

// =============================================================================
// Validation
// =============================================================================

fn parse_run_id(raw: &str) -> Result<RunId> {
    RunId::parse(raw.trim()).map_err(|e| RunError::ValidationError(e.to_string()))
}

/// Normalize a share request: trimmed run id, trimmed and de-duplicated
/// emails
fn validate_share_request(req: ShareRunRequest) -> Result<(RunId, Vec<String>)> {
    let run_id = parse_run_id(&req.run_id)?;

    let mut emails: Vec<String> = Vec::with_capacity(req.user_email_list.len());
    for email in req.user_email_list {
        let email = email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(RunError::ValidationError(format!(
                "'{}' is not a valid email",
                email
            )));
        }
        if !emails.contains(&email) {
            emails.push(email);
        }
    }

    if emails.is_empty() {
        return Err(RunError::ValidationError(
            "userEmailList cannot be empty".to_string(),
        ));
    }

    Ok((run_id, emails))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(run_id: &str, emails: &[&str]) -> ShareRunRequest {
        ShareRunRequest {
            run_id: run_id.to_string(),
            user_email_list: emails.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_share_request_deduplicates_emails() {
        let (run_id, emails) =
            validate_share_request(request(" run-1 ", &["a@x.io", " a@x.io", "b@x.io"])).unwrap();
        assert_eq!(run_id.as_str(), "run-1");
        assert_eq!(emails, vec!["a@x.io".to_string(), "b@x.io".to_string()]);
    }

    #[test]
    fn test_share_request_needs_emails() {
        assert!(matches!(
            validate_share_request(request("run-1", &[])),
            Err(RunError::ValidationError(_))
        ));
        assert!(matches!(
            validate_share_request(request("run-1", &["nobody"])),
            Err(RunError::ValidationError(_))
        ));
    }

    #[test]
    fn test_share_request_rejects_bad_run_id() {
        assert!(matches!(
            validate_share_request(request("", &["a@x.io"])),
            Err(RunError::ValidationError(_))
        ));
        assert!(matches!(
            validate_share_request(request("run*", &["a@x.io"])),
            Err(RunError::ValidationError(_))
        ));
    }
}
