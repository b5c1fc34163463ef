// SPDX-License-Identifier: MIT
//! Connection pool and migration runner shared by every store crate.
//!
//! Backed by Postgres via `sqlx` rather than an embedded database, since
//! this gateway is a single process serving many concurrent users over the
//! network rather than a local single-user tool.

use sqlx::postgres::{PgPool, PgPoolOptions};

pub type DbPool = PgPool;

/// Connect to Postgres with a small bounded pool; the gateway is a single
/// process serving many users, not a one-connection-per-request service.
pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Apply all embedded migrations. Idempotent — safe to call on every
/// startup.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
