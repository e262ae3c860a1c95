//! Run domain types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters a run identifier may never contain.
///
/// The identifier doubles as the log stream key, so line breaks and glob
/// wildcards are refused outright.
const FORBIDDEN_RUN_ID_CHARS: [char; 4] = ['\n', '\r', '*', '?'];

/// Identifier of a run, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

/// Reasons a raw string is not a usable run identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunIdError {
    #[error("run id must not be empty")]
    Empty,

    #[error("run id contains forbidden character {0:?}")]
    ForbiddenCharacter(char),
}

impl RunId {
    /// Parse and validate a run identifier
    ///
    /// # Arguments
    /// * `raw` - The identifier as supplied by a caller
    ///
    /// # Returns
    /// The validated identifier, or the reason it was refused
    pub fn parse(raw: &str) -> Result<Self, RunIdError> {
        if raw.is_empty() {
            return Err(RunIdError::Empty);
        }

        if let Some(c) = raw.chars().find(|c| FORBIDDEN_RUN_ID_CHARS.contains(c)) {
            return Err(RunIdError::ForbiddenCharacter(c));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RunId {
    type Error = RunIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RunId::parse(&value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

/// Run metadata record
///
/// Structure shared between the server (reads from persistence) and the
/// client (renders).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    #[serde(rename = "type")]
    pub run_type: String,
    pub command: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Level of access a user holds on a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
        }
    }
}
