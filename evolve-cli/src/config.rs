//! Configuration module
//!
//! Handles CLI configuration including server URL and credentials.

use evolve_client::EvolveClient;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the Evolve server
    pub server_url: String,

    /// Session token, if the caller is logged in
    pub token: Option<String>,
}

impl Config {
    /// Build an API client for this configuration
    pub fn client(&self) -> EvolveClient {
        let client = EvolveClient::new(&self.server_url);
        match &self.token {
            Some(token) => client.with_token(token),
            None => client,
        }
    }
}
