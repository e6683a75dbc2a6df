//! Persistence layer for monitors and check history.
//!
//! Backed by a local LibSQL (SQLite) file behind a small connection
//! pool. Schema changes go through versioned migrations.

pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{DatabaseImpl, MonitorRegistry, ResultSink};

use anyhow::Result;

use crate::pool::LibsqlPool;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

/// Open the database at `path`, run migrations, and return the pool
pub async fn connect(path: &str) -> Result<LibsqlPool> {
    let pool = crate::pool::create_pool(path).await?;
    let conn = pool.get().await?;
    initialize_database(&conn).await?;
    drop(conn);
    Ok(pool)
}
