//! Shared application state handed to every handler

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthVerifier;
use crate::relay::{LogStoreClient, RelayConfig};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub log_store: LogStoreClient,
    pub auth: Arc<dyn AuthVerifier>,
    pub relay: RelayConfig,
    /// Cancelled on server shutdown; every relay session holds a child token
    pub shutdown: CancellationToken,
}
