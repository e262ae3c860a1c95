//! Authenticated caller

use serde::{Deserialize, Serialize};

/// The user a session token resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub user_name: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
}
