//! Caller authentication
//!
//! Session tokens are opaque here. They are handed to an external verifier
//! which answers with the principal they belong to.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use evolve_core::domain::principal::Principal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::error::ApiError;
use crate::state::AppState;

/// Cookie carrying the session token
pub const TOKEN_COOKIE: &str = "t";

const VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no session token")]
    MissingToken,

    #[error("invalid session token")]
    InvalidToken,

    #[error("auth verifier unavailable: {0}")]
    Unavailable(String),
}

/// Resolves session tokens to principals
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

/// Verifier reached over HTTP
///
/// `POST {base_url}/api/auth/verify` with `{"token": ...}`, answered by
/// `{"valid": bool, "id", "userName", "fullName", "email", "role"}`.
pub struct HttpAuthVerifier {
    client: reqwest::Client,
    verify_url: String,
}

impl HttpAuthVerifier {
    pub fn new(base_url: &str) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            verify_url: format!("{}/api/auth/verify", base_url.trim_end_matches('/')),
        })
    }
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    valid: bool,
    #[serde(default)]
    id: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    role: String,
}

#[async_trait]
impl AuthVerifier for HttpAuthVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let response = self
            .client
            .post(&self.verify_url)
            .json(&VerifyRequest { token })
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            return Err(AuthError::Unavailable(format!("verifier answered {}", status)));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        if !body.valid || body.id.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(Principal {
            id: body.id,
            user_name: body.user_name,
            full_name: body.full_name,
            email: body.email,
            role: body.role,
        })
    }
}

/// Session token from the `t` cookie, or else a bearer token
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_string());

    from_cookie
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

/// Extractor for handlers that need an authenticated caller
pub struct Authenticated(pub Principal);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let principal = state.auth.verify(&token).await?;

        tracing::debug!("Authenticated user {} ({})", principal.user_name, principal.id);
        Ok(Authenticated(principal))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken => {
                ApiError::Unauthorized("unauthorized".to_string())
            }
            AuthError::Unavailable(msg) => {
                ApiError::InternalError(format!("auth verifier unavailable: {}", msg))
            }
        }
    }
}
