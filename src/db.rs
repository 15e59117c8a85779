//! SQLite storage: pool setup, schema migrations and driver error classification.
//!
//! Every store in the crate shares one [`Database`]. Opening a file-backed
//! database switches it to WAL journaling and enforces foreign keys, so a
//! content row can never point at a missing type, tag or owner.
//!
//! # Example
//!
//! ```no_run
//! use linkhive::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("linkhive.db")).await?;
//! let tags: Vec<(i64, String)> = sqlx::query_as("SELECT id, label FROM tags")
//!     .fetch_all(db.pool())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{info, instrument};

/// SQLite serializes writers, so a handful of connections is plenty.
const MAX_CONNECTIONS: u32 = 5;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure to open or migrate the database.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("failed to open database: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("failed to apply schema migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Coarse classification of a query failure, carried by the domain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// Another connection holds the lock past the busy timeout.
    BusyOrLocked,
    /// A UNIQUE or PRIMARY KEY constraint rejected the write.
    UniqueViolation,
    /// A referenced row does not exist.
    ForeignKeyViolation,
    /// NOT NULL, CHECK or another constraint rejected the write.
    ConstraintViolation,
    /// The pool had no connection to hand out, or was shut down.
    PoolUnavailable,
    Other,
}

impl DbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::PoolUnavailable,
            sqlx::Error::Database(database_error) => classify(database_error.as_ref()),
            _ => Self::Other,
        }
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::UniqueViolation => "unique_violation",
            Self::ForeignKeyViolation => "foreign_key_violation",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolUnavailable => "pool_unavailable",
            Self::Other => "other",
        })
    }
}

fn classify(database_error: &(dyn sqlx::error::DatabaseError + 'static)) -> DbErrorKind {
    // Extended result codes: 2067 UNIQUE, 1555 PRIMARYKEY, 787 FOREIGNKEY.
    let code = database_error.code();
    let code = code.as_deref();

    if database_error.is_unique_violation() || matches!(code, Some("2067" | "1555")) {
        DbErrorKind::UniqueViolation
    } else if database_error.is_foreign_key_violation() || code == Some("787") {
        DbErrorKind::ForeignKeyViolation
    } else if database_error.is_check_violation()
        || code.is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        DbErrorKind::ConstraintViolation
    } else if matches!(code, Some("5" | "6" | "SQLITE_BUSY" | "SQLITE_LOCKED")) {
        DbErrorKind::BusyOrLocked
    } else {
        DbErrorKind::Other
    }
}

/// True when `error` means a concurrent writer already inserted the same key.
#[must_use]
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    DbErrorKind::from_sqlx(error) == DbErrorKind::UniqueViolation
}

/// Shared handle to the connection pool. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database file at `db_path` and migrates it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connection`] if the file cannot be opened, or
    /// [`DbError::Migration`] if the schema cannot be brought up to date.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        info!("Database ready");
        Ok(db)
    }

    /// Opens a private in-memory database with the full schema.
    ///
    /// The pool holds exactly one connection and never recycles it; dropping
    /// that connection would drop the data with it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or migrations fail.
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Current journal mode as reported by SQLite (e.g. `wal`, `memory`).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connection`] if the pragma query fails.
    pub async fn journal_mode(&self) -> Result<String, DbError> {
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;
        Ok(mode.to_ascii_lowercase())
    }
}
