//! Evolve HTTP Client
//!
//! A simple, type-safe HTTP client for the Evolve server API.
//!
//! # Example
//!
//! ```no_run
//! use evolve_client::{EvolveClient, LogEvent};
//! use evolve_core::domain::run::RunId;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = EvolveClient::new("http://localhost:5002").with_token("session-token");
//!
//!     let run_id = RunId::parse("run-42")?;
//!     let mut events = client.follow_run_logs(&run_id).await?;
//!     while let Some(event) = events.next().await {
//!         match event? {
//!             LogEvent::Log(line) => println!("{}", line.raw),
//!             LogEvent::Done(message) => println!("{}", message),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod logs;
mod runs;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use logs::{LogEvent, LogLine, LogStream};

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;

/// HTTP client for the Evolve server API
///
/// Methods are grouped by concern:
/// - Run metadata (list, get, share)
/// - Live log following
#[derive(Debug, Clone)]
pub struct EvolveClient {
    /// Base URL of the server (e.g., "http://localhost:5002")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Session token sent as a bearer token
    token: Option<String>,
}

impl EvolveClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server API (e.g., "http://localhost:5002")
    ///
    /// # Example
    /// ```
    /// use evolve_client::EvolveClient;
    ///
    /// let client = EvolveClient::new("http://localhost:5002");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// A request timeout on `client` also bounds how long a log stream may
    /// stay open.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server API
    /// * `client` - A configured reqwest Client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: None,
        }
    }

    /// Authenticate every request with a session token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Fail with the API's error message unless the status is a success
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_message(&body)));
        }

        Ok(response)
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response whose body is not needed
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        Self::check_status(response).await.map(|_| ())
    }
}

/// Pull the message out of an `{"error": "..."}` body, or use the body as is
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
