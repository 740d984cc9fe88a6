//! Persistence Layer
//!
//! Reconciled facts are written to one of two sinks: a SQLite database (one
//! row per ticker) or a directory of per-ticker JSON documents. Both only
//! ever overwrite facts that had data in the current run. Provenance goes to
//! an append-only log file and, with the SQLite sink, to an audit table.
//!
//! # Database Schema
//!
//! ## Companies Table
//! - ticker: Primary key (e.g., "ABX.TO")
//! - name, name_alt, website: Identity fields from the input list
//! - one REAL column per fact plus a `<fact>_flagged` marker
//! - news_link: Optional news page URL
//! - last_updated: Timestamp of the last write
//!
//! ## Fact Audit Table
//! - id: Serial
//! - ticker, fact: What was reconciled
//! - value, currency, variance, relative_variance, flagged: The outcome
//! - sources_json: Contributing sources
//! - observations_json: Every reading, raw and normalized
//! - resolved_at: Timestamp

pub mod company_repository;
pub mod json_store;
pub mod models;
pub mod provenance_audit;
pub mod provenance_file;

pub use company_repository::SqliteCompanyRepository;
pub use json_store::JsonCompanyStore;
pub use provenance_audit::SqliteProvenanceLog;
pub use provenance_file::FileProvenanceLog;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::domain::value_objects::fact_key::FactKey;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// Initialize the database connection pool
///
/// # Arguments
/// - `database_url`: SQLite URL (e.g., "sqlite://data/mining_companies.db" or "sqlite::memory:")
///
/// # Errors
/// Returns error if the connection or the migrations fail
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", database_url);

    // Ensure data directory exists
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .log_statements(tracing::log::LevelFilter::Debug);

    // Every in-memory connection is its own database
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

fn companies_table_sql() -> String {
    let fact_columns: String = FactKey::ALL
        .iter()
        .map(|key| {
            format!(
                "            {col} REAL,\n            {col}_flagged INTEGER NOT NULL DEFAULT 0,\n",
                col = key.column()
            )
        })
        .collect();

    format!(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            ticker TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_alt TEXT,
            website TEXT,
{}            news_link TEXT,
            last_updated DATETIME
        )
        "#,
        fact_columns
    )
}

/// Databases created before a fact existed get its columns added
async fn add_missing_fact_columns(pool: &DbPool) -> Result<(), DatabaseError> {
    let existing: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info('companies')")
        .fetch_all(pool)
        .await?;

    for key in FactKey::ALL {
        let column = key.column();
        if existing.iter().any(|(name,)| name == column) {
            continue;
        }
        for definition in [
            format!("{} REAL", column),
            format!("{}_flagged INTEGER NOT NULL DEFAULT 0", column),
        ] {
            sqlx::query(&format!("ALTER TABLE companies ADD COLUMN {}", definition))
                .execute(pool)
                .await
                .map_err(|e| {
                    DatabaseError::MigrationError(format!("Failed to add column {}: {}", column, e))
                })?;
        }
        info!("Added {} columns to companies table", column);
    }
    Ok(())
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    sqlx::query(&companies_table_sql())
        .execute(pool)
        .await
        .map_err(|e| {
            DatabaseError::MigrationError(format!("Failed to create companies table: {}", e))
        })?;

    add_missing_fact_columns(pool).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fact_audit (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticker TEXT NOT NULL,
            fact TEXT NOT NULL,
            value REAL NOT NULL,
            currency TEXT,
            variance REAL NOT NULL,
            relative_variance REAL,
            flagged BOOLEAN NOT NULL DEFAULT 0,
            sources_json TEXT NOT NULL,
            observations_json TEXT NOT NULL,
            resolved_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create fact_audit table: {}", e))
    })?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_fact_audit_ticker_fact ON fact_audit(ticker, fact, resolved_at)",
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_fact_audit_flagged ON fact_audit(flagged)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    info!("✓ Database migrations completed successfully");

    Ok(())
}
