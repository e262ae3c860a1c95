//! Run DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::run::Run;

/// Request body naming a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDataRequest {
    #[serde(rename = "runID")]
    pub run_id: String,
}

/// Request to grant other users read access to a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRunRequest {
    #[serde(rename = "runID")]
    pub run_id: String,

    /// Emails of the users to share the run with
    #[serde(rename = "userEmailList")]
    pub user_email_list: Vec<String>,
}

/// Run as seen from one user's run list
///
/// Runs the caller created carry `created_by`; runs shared with the caller
/// carry `shared_by` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    #[serde(rename = "type")]
    pub run_type: String,
    pub command: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_shared: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl RunSummary {
    /// Build the summary of `run` from the point of view of `user_id`
    pub fn for_user(run: Run, user_id: &str) -> Self {
        let is_shared = run.created_by != user_id;
        let (shared_by, created_by) = if is_shared {
            (Some(run.created_by), None)
        } else {
            (None, Some(run.created_by))
        };

        Self {
            id: run.id,
            name: run.name,
            description: run.description,
            status: run.status,
            run_type: run.run_type,
            command: run.command,
            created_at: run.created_at,
            updated_at: run.updated_at,
            is_shared,
            shared_by,
            created_by,
        }
    }
}
