//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::Database;

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        if current_version.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: Create initial schema
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying database migration v1");

        // Wrap migration in a transaction so partial failures don't leave the DB in a broken state
        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            for (name, statement) in SCHEMA_V1 {
                sqlx::query(statement)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to create {}: {}",
                            name, e
                        )))
                    })?;
            }
            Self::record_migration(conn, 1).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to commit migration v1: {}",
                            e
                        )))
                    })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!("Database migration v1 complete");
        Ok(())
    }

    async fn record_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration v{}: {}",
                    version, e
                )))
            })?;
        Ok(())
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const SCHEMA_V1: &[(&str, &str)] = &[
    (
        "templates table",
        r#"
        CREATE TABLE templates (
            id BLOB PRIMARY KEY,
            channel TEXT NOT NULL CHECK (channel IN ('email', 'messaging')),
            name TEXT NOT NULL,
            subject TEXT,
            body TEXT NOT NULL,
            html_body TEXT,
            variables TEXT NOT NULL DEFAULT '[]',
            owner TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "campaigns table",
        r#"
        CREATE TABLE campaigns (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'Draft',
            email_template_id BLOB REFERENCES templates(id) ON DELETE SET NULL,
            messaging_template_id BLOB REFERENCES templates(id) ON DELETE SET NULL,
            target TEXT NOT NULL,
            deadline INTEGER,
            owner TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER
        )
        "#,
    ),
    (
        "vendors table",
        r#"
        CREATE TABLE vendors (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            company_name TEXT,
            contact_person TEXT,
            email TEXT,
            phone TEXT,
            whatsapp TEXT,
            industry TEXT,
            region TEXT,
            size_class TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "vendor_responses table",
        r#"
        CREATE TABLE vendor_responses (
            id BLOB PRIMARY KEY,
            campaign_id BLOB NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
            vendor_id BLOB NOT NULL REFERENCES vendors(id) ON DELETE CASCADE,
            response_status TEXT NOT NULL DEFAULT 'Pending',
            email_sent_at INTEGER,
            messaging_sent_at INTEGER,
            created_at INTEGER NOT NULL,
            UNIQUE (campaign_id, vendor_id)
        )
        "#,
    ),
    (
        "campaign status index",
        "CREATE INDEX idx_campaigns_status ON campaigns(status)",
    ),
    (
        "response campaign index",
        "CREATE INDEX idx_vendor_responses_campaign ON vendor_responses(campaign_id, response_status)",
    ),
];
