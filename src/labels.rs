//! Tag and type registry: shared, lazily-created labels keyed by exact text.
//!
//! Labels are global (not per user) and never deleted. Resolution is a
//! get-or-create: look the label up, insert it when absent. Two requests can
//! race on the same unseen label; the loser's insert hits the `UNIQUE`
//! constraint and it re-reads the winner's row instead of failing.

use async_trait::async_trait;
use futures_util::future::try_join_all;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::db::{Database, DbErrorKind, is_unique_violation};
use crate::entities::{Label, LabelId};

/// Registry errors.
#[derive(Debug, Clone, Error)]
pub enum LabelError {
    /// Database operation failed.
    #[error("{kind} registry database error ({db_kind}): {message}")]
    Database {
        kind: LabelKind,
        db_kind: DbErrorKind,
        message: String,
    },

    /// Insert reported a duplicate but the row could not be read back.
    #[error("{kind} '{label}' vanished after a concurrent insert")]
    Vanished { kind: LabelKind, label: String },
}

impl LabelError {
    fn database(kind: LabelKind, err: &sqlx::Error) -> Self {
        Self::Database {
            kind,
            db_kind: DbErrorKind::from_sqlx(err),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LabelError>;

/// Which registry table a label lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Tag,
    Type,
}

impl LabelKind {
    fn select_sql(self) -> &'static str {
        match self {
            Self::Tag => "SELECT id FROM tags WHERE label = ?",
            Self::Type => "SELECT id FROM types WHERE label = ?",
        }
    }

    fn insert_sql(self) -> &'static str {
        match self {
            Self::Tag => "INSERT INTO tags (label) VALUES (?) RETURNING id",
            Self::Type => "INSERT INTO types (label) VALUES (?) RETURNING id",
        }
    }
}

impl std::fmt::Display for LabelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Tag => "tag",
            Self::Type => "type",
        })
    }
}

/// Get-or-create contract for tags and types.
#[async_trait]
pub trait LabelRepository: Send + Sync {
    /// Resolves each tag label to an id; output order matches input order.
    async fn get_or_create_tags(&self, labels: &[String]) -> Result<Vec<LabelId>>;

    /// Resolves one type label to an id.
    async fn get_or_create_type(&self, label: &str) -> Result<LabelId>;
}

/// `SQLite`-backed label registry.
#[derive(Debug, Clone)]
pub struct LabelRegistry {
    db: Database,
}

impl LabelRegistry {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn find(&self, kind: LabelKind, label: &str) -> Result<Option<LabelId>> {
        sqlx::query_scalar::<_, LabelId>(kind.select_sql())
            .bind(label)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| LabelError::database(kind, &e))
    }

    /// Looks `label` up and inserts it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::Database`] for storage failures other than a lost
    /// insert race.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, kind: LabelKind, label: &str) -> Result<LabelId> {
        if let Some(id) = self.find(kind, label).await? {
            return Ok(id);
        }

        match sqlx::query_scalar::<_, LabelId>(kind.insert_sql())
            .bind(label)
            .fetch_one(self.db.pool())
            .await
        {
            Ok(id) => {
                debug!(%id, "Created registry entry");
                Ok(id)
            }
            Err(err) if is_unique_violation(&err) => {
                debug!("Lost insert race; reusing existing entry");
                self.find(kind, label)
                    .await?
                    .ok_or_else(|| LabelError::Vanished {
                        kind,
                        label: label.to_string(),
                    })
            }
            Err(err) => Err(LabelError::database(kind, &err)),
        }
    }

    /// Lists every entry of one kind, ordered by label.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::Database`] if the query fails.
    pub async fn list(&self, kind: LabelKind) -> Result<Vec<Label>> {
        let sql = match kind {
            LabelKind::Tag => "SELECT id, label FROM tags ORDER BY label",
            LabelKind::Type => "SELECT id, label FROM types ORDER BY label",
        };
        sqlx::query_as::<_, Label>(sql)
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| LabelError::database(kind, &e))
    }
}

#[async_trait]
impl LabelRepository for LabelRegistry {
    #[instrument(skip(self), fields(count = labels.len()))]
    async fn get_or_create_tags(&self, labels: &[String]) -> Result<Vec<LabelId>> {
        try_join_all(
            labels
                .iter()
                .map(|label| self.get_or_create(LabelKind::Tag, label)),
        )
        .await
    }

    async fn get_or_create_type(&self, label: &str) -> Result<LabelId> {
        self.get_or_create(LabelKind::Type, label).await
    }
}
