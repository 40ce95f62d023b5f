//! Database initialization and access layer

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

pub mod models;
pub mod readings;

/// Initialize database connection and create tables if needed
///
/// Creates the database file (and parent directory) on first run. Safe to
/// call on every startup; schema creation is idempotent.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_pragmas(&pool).await?;
    create_glucose_readings_table(&pool).await?;

    Ok(pool)
}

/// Create an in-memory database with the full schema
///
/// Used by tests; a single connection keeps the in-memory database alive for
/// the lifetime of the pool.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    configure_pragmas(&pool).await?;
    create_glucose_readings_table(&pool).await?;

    Ok(pool)
}

async fn configure_pragmas(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL mode allows concurrent readers while the ingestion cycle writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    // Wait out short-lived write locks instead of failing the statement
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(pool)
        .await?;

    Ok(())
}

/// Glucose readings table: timestamp is the natural unique key
async fn create_glucose_readings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS glucose_readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            value REAL NOT NULL,
            timestamp INTEGER NOT NULL UNIQUE
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}
