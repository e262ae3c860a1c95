use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

/// Create the Postgres pool without connecting; the first query does.
///
/// The relay never touches the database, so log streaming keeps working
/// while Postgres is down.
pub fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url)
}
