//! `SQLite` persistence for content records and their ordered tag references.

use std::collections::HashMap;

use sqlx::{Sqlite, Transaction};
use tracing::instrument;

use crate::db::Database;
use crate::entities::{ContentId, ContentRecord, Label, LabelId, UserId};

use super::{ContentError, Result};

const RECORD_COLUMNS: &str = "SELECT c.id, c.title, c.link, c.image_url, c.type_id, \
     t.label AS type_label, c.user_id \
     FROM contents c JOIN types t ON t.id = c.type_id";

#[derive(Debug, sqlx::FromRow)]
struct ContentRow {
    id: ContentId,
    title: String,
    link: String,
    image_url: String,
    type_id: LabelId,
    type_label: String,
    user_id: UserId,
}

impl ContentRow {
    fn into_record(self, tags: Vec<Label>) -> ContentRecord {
        ContentRecord {
            id: self.id,
            title: self.title,
            link: self.link,
            image_url: self.image_url,
            content_type: Label {
                id: self.type_id,
                label: self.type_label,
            },
            tags,
            user_id: self.user_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TagRow {
    content_id: ContentId,
    id: LabelId,
    label: String,
}

/// A fully resolved record ready to be written.
#[derive(Debug, Clone)]
pub struct NewContentRow<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub image_url: &'a str,
    pub type_id: LabelId,
    pub tag_ids: &'a [LabelId],
}

/// Field-level changes to write; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct ContentPatch {
    pub title: Option<String>,
    /// New link together with its freshly resolved preview.
    pub link: Option<(String, String)>,
    pub type_id: Option<LabelId>,
    pub tag_ids: Option<Vec<LabelId>>,
}

/// Content record storage, always scoped to the owning user.
#[derive(Debug, Clone)]
pub struct ContentStore {
    db: Database,
}

impl ContentStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a record and its tag references in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Database`] if the insert fails.
    #[instrument(skip_all, fields(%user_id))]
    pub async fn insert(&self, user_id: UserId, row: NewContentRow<'_>) -> Result<ContentId> {
        let mut tx = self.db.pool().begin().await?;

        let id: ContentId = sqlx::query_scalar(
            "INSERT INTO contents (title, link, image_url, type_id, user_id) \
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(row.title)
        .bind(row.link)
        .bind(row.image_url)
        .bind(row.type_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        write_tags(&mut tx, id, row.tag_ids).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Fetches one of the user's records.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Database`] if the query fails.
    pub async fn get(&self, user_id: UserId, id: ContentId) -> Result<Option<ContentRecord>> {
        let row = sqlx::query_as::<_, ContentRow>(&format!(
            "{RECORD_COLUMNS} WHERE c.id = ? AND c.user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let tags = sqlx::query_as::<_, TagRow>(
            "SELECT ct.content_id, t.id, t.label FROM content_tags ct \
             JOIN tags t ON t.id = ct.tag_id WHERE ct.content_id = ? ORDER BY ct.position",
        )
        .bind(id)
        .fetch_all(self.db.pool())
        .await?
        .into_iter()
        .map(|tag| Label {
            id: tag.id,
            label: tag.label,
        })
        .collect();
        Ok(Some(row.into_record(tags)))
    }

    /// Lists all of the user's records, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Database`] if the query fails.
    #[instrument(skip_all, fields(%user_id))]
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<ContentRecord>> {
        let rows = sqlx::query_as::<_, ContentRow>(&format!(
            "{RECORD_COLUMNS} WHERE c.user_id = ? ORDER BY c.id"
        ))
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        self.attach_tags(user_id, rows).await
    }

    /// Lists the user's records of one type.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Database`] if the query fails.
    pub async fn list_for_user_and_type(
        &self,
        user_id: UserId,
        type_id: LabelId,
    ) -> Result<Vec<ContentRecord>> {
        let rows = sqlx::query_as::<_, ContentRow>(&format!(
            "{RECORD_COLUMNS} WHERE c.user_id = ? AND c.type_id = ? ORDER BY c.id"
        ))
        .bind(user_id)
        .bind(type_id)
        .fetch_all(self.db.pool())
        .await?;
        self.attach_tags(user_id, rows).await
    }

    /// Distinct types referenced by the user's records.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Database`] if the query fails.
    pub async fn distinct_types(&self, user_id: UserId) -> Result<Vec<Label>> {
        Ok(sqlx::query_as::<_, Label>(
            "SELECT DISTINCT t.id, t.label FROM contents c JOIN types t ON t.id = c.type_id \
             WHERE c.user_id = ? ORDER BY t.label",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?)
    }

    /// Applies a patch to one of the user's records.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::NotFound`] if the record is not the user's,
    /// or [`ContentError::Database`] if a write fails.
    #[instrument(skip_all, fields(%user_id, %id))]
    pub async fn apply(&self, user_id: UserId, id: ContentId, patch: ContentPatch) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        let owned: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM contents WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if owned.is_none() {
            return Err(ContentError::NotFound(id));
        }

        if let Some(title) = &patch.title {
            sqlx::query("UPDATE contents SET title = ? WHERE id = ?")
                .bind(title)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        if let Some((link, image_url)) = &patch.link {
            sqlx::query("UPDATE contents SET link = ?, image_url = ? WHERE id = ?")
                .bind(link)
                .bind(image_url)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        if let Some(type_id) = patch.type_id {
            sqlx::query("UPDATE contents SET type_id = ? WHERE id = ?")
                .bind(type_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        if let Some(tag_ids) = &patch.tag_ids {
            sqlx::query("DELETE FROM content_tags WHERE content_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            write_tags(&mut tx, id, tag_ids).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Deletes one of the user's records. Returns false if there was none.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Database`] if the delete fails.
    #[instrument(skip_all, fields(%user_id))]
    pub async fn delete(&self, user_id: UserId, id: ContentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contents WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn attach_tags(
        &self,
        user_id: UserId,
        rows: Vec<ContentRow>,
    ) -> Result<Vec<ContentRecord>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut tags_by_content: HashMap<ContentId, Vec<Label>> = HashMap::new();
        let tag_rows = sqlx::query_as::<_, TagRow>(
            "SELECT ct.content_id, t.id, t.label FROM content_tags ct \
             JOIN tags t ON t.id = ct.tag_id \
             JOIN contents c ON c.id = ct.content_id \
             WHERE c.user_id = ? ORDER BY ct.content_id, ct.position",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        for tag in tag_rows {
            tags_by_content.entry(tag.content_id).or_default().push(Label {
                id: tag.id,
                label: tag.label,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let tags = tags_by_content.remove(&row.id).unwrap_or_default();
                row.into_record(tags)
            })
            .collect())
    }
}

async fn write_tags(
    tx: &mut Transaction<'_, Sqlite>,
    content_id: ContentId,
    tag_ids: &[LabelId],
) -> Result<()> {
    for (position, tag_id) in tag_ids.iter().enumerate() {
        let position = i64::try_from(position).unwrap_or(i64::MAX);
        sqlx::query("INSERT INTO content_tags (content_id, tag_id, position) VALUES (?, ?, ?)")
            .bind(content_id)
            .bind(*tag_id)
            .bind(position)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
