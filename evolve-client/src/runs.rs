//! Run-related API endpoints

use crate::EvolveClient;
use crate::error::Result;
use evolve_core::domain::run::Run;
use evolve_core::dto::run::{RunDataRequest, RunSummary, ShareRunRequest};
use reqwest::Method;

impl EvolveClient {
    // =============================================================================
    // Run Metadata
    // =============================================================================

    /// List the runs the caller created or was given access to
    pub async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let response = self.request(Method::GET, "/api/runs").send().await?;

        self.handle_response(response).await
    }

    /// Get a run by ID
    ///
    /// # Arguments
    /// * `run_id` - The run identifier
    ///
    /// # Returns
    /// The run details, or a 404 API error if the caller cannot see it
    pub async fn get_run(&self, run_id: &str) -> Result<Run> {
        let req = RunDataRequest {
            run_id: run_id.to_string(),
        };
        let response = self
            .request(Method::POST, "/api/runs/get")
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Grant read access on a run to other users
    ///
    /// # Arguments
    /// * `run_id` - The run to share
    /// * `emails` - Emails of the users who get access
    ///
    /// # Example
    /// ```no_run
    /// # use evolve_client::EvolveClient;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = EvolveClient::new("http://localhost:5002").with_token("session-token");
    /// client
    ///     .share_run("run-42", vec!["alice@example.com".to_string()])
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn share_run(&self, run_id: &str, emails: Vec<String>) -> Result<()> {
        let req = ShareRunRequest {
            run_id: run_id.to_string(),
            user_email_list: emails,
        };
        let response = self
            .request(Method::POST, "/api/runs/share")
            .json(&req)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
