//! Content workflow: saving links with resolved previews, types and tags.
//!
//! [`ContentService`] is the only place that talks to all three collaborators:
//! the [`ContentStore`] for persistence, a [`LabelRepository`] for tag and
//! type ids, and a [`PreviewSource`] for the preview artifact. The last two
//! are trait objects so tests can count calls.

mod diff;
mod store;

pub use diff::ContentChanges;
pub use store::{ContentPatch, ContentStore, NewContentRow};

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::db::DbErrorKind;
use crate::entities::{ContentId, ContentRecord, Label, LabelId, UserId};
use crate::labels::{LabelError, LabelRepository};
use crate::preview::PreviewSource;

/// Content workflow errors.
#[derive(Debug, Error)]
pub enum ContentError {
    /// No record with this id belongs to the caller.
    #[error("content {0} not found")]
    NotFound(ContentId),

    /// A required field is missing or blank.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Tag or type resolution failed.
    #[error(transparent)]
    Labels(#[from] LabelError),

    /// Storage failure.
    #[error("content database error ({kind}): {message}")]
    Database { kind: DbErrorKind, message: String },
}

impl From<sqlx::Error> for ContentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContentError>;

/// A new link submission.
#[derive(Debug, Clone, Deserialize)]
pub struct NewContent {
    pub title: String,
    pub link: String,
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewContent {
    fn validate(&self) -> Result<()> {
        require("title", &self.title)?;
        require("link", &self.link)?;
        require("type", &self.content_type)
    }
}

/// A partial edit; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl ContentUpdate {
    fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            require("title", title)?;
        }
        if let Some(link) = &self.link {
            require("link", link)?;
        }
        if let Some(content_type) = &self.content_type {
            require("type", content_type)?;
        }
        Ok(())
    }
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ContentError::Invalid {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Orchestrates preview resolution, label resolution and persistence.
#[derive(Clone)]
pub struct ContentService {
    store: ContentStore,
    labels: Arc<dyn LabelRepository>,
    previews: Arc<dyn PreviewSource>,
}

impl std::fmt::Debug for ContentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentService")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ContentService {
    #[must_use]
    pub fn new(
        store: ContentStore,
        labels: Arc<dyn LabelRepository>,
        previews: Arc<dyn PreviewSource>,
    ) -> Self {
        Self {
            store,
            labels,
            previews,
        }
    }

    /// Saves a new link for `user_id`.
    ///
    /// Preview, type and tag resolution run concurrently. The preview never
    /// fails; a link without one is saved with an empty `image_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Invalid`] for blank fields, or a label or
    /// database error.
    #[instrument(skip_all, fields(%user_id, link = %input.link))]
    pub async fn create(&self, user_id: UserId, input: NewContent) -> Result<ContentRecord> {
        input.validate()?;

        let (preview, type_id, tag_ids) = tokio::join!(
            self.previews.resolve_preview(&input.link),
            self.labels.get_or_create_type(&input.content_type),
            self.labels.get_or_create_tags(&input.tags),
        );
        let type_id = type_id?;
        let tag_ids = tag_ids?;

        let id = self
            .store
            .insert(
                user_id,
                NewContentRow {
                    title: &input.title,
                    link: &input.link,
                    image_url: preview.as_str(),
                    type_id,
                    tag_ids: &tag_ids,
                },
            )
            .await?;
        info!(%id, has_preview = !preview.is_empty(), "Saved content");

        self.fetch(user_id, id).await
    }

    /// All of the user's records.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Database`] if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<ContentRecord>> {
        self.store.list_for_user(user_id).await
    }

    /// Applies `update` to one of the user's records, touching only what changed.
    ///
    /// A changed link re-runs preview resolution once; changed type or tags
    /// re-run label resolution. An update that changes nothing returns the
    /// stored record without any further work.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::NotFound`] if the record is absent or owned by
    /// someone else, [`ContentError::Invalid`] for blank fields, or a label or
    /// database error.
    #[instrument(skip_all, fields(%user_id, %id))]
    pub async fn update(
        &self,
        user_id: UserId,
        id: ContentId,
        update: ContentUpdate,
    ) -> Result<ContentRecord> {
        update.validate()?;
        let existing = self.fetch(user_id, id).await?;

        let changes = ContentChanges::between(&existing, &update);
        if changes.is_empty() {
            debug!("Update changes nothing");
            return Ok(existing);
        }

        let mut patch = ContentPatch {
            title: changes.title,
            ..ContentPatch::default()
        };
        if let Some(link) = changes.link {
            let preview = self.previews.resolve_preview(&link).await;
            patch.link = Some((link, preview.into_string()));
        }
        if let Some(label) = &changes.content_type {
            patch.type_id = Some(self.labels.get_or_create_type(label).await?);
        }
        if let Some(tags) = &changes.tags {
            patch.tag_ids = Some(self.labels.get_or_create_tags(tags).await?);
        }

        self.store.apply(user_id, id, patch).await?;
        info!("Updated content");
        self.fetch(user_id, id).await
    }

    /// Deletes one of the user's records.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::NotFound`] if there is no such record.
    pub async fn delete(&self, user_id: UserId, id: ContentId) -> Result<()> {
        if self.store.delete(user_id, id).await? {
            info!(%user_id, %id, "Deleted content");
            Ok(())
        } else {
            Err(ContentError::NotFound(id))
        }
    }

    /// Distinct types used by the user's records.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Database`] if the query fails.
    pub async fn types(&self, user_id: UserId) -> Result<Vec<Label>> {
        self.store.distinct_types(user_id).await
    }

    /// The user's records of one type.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Database`] if the query fails.
    pub async fn by_type(&self, user_id: UserId, type_id: LabelId) -> Result<Vec<ContentRecord>> {
        self.store.list_for_user_and_type(user_id, type_id).await
    }

    async fn fetch(&self, user_id: UserId, id: ContentId) -> Result<ContentRecord> {
        self.store
            .get(user_id, id)
            .await?
            .ok_or(ContentError::NotFound(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::db::Database;
    use crate::labels::LabelRegistry;
    use crate::preview::PreviewArtifact;

    #[derive(Default)]
    struct CountingPreviews {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PreviewSource for CountingPreviews {
        async fn resolve_preview(&self, url: &str) -> PreviewArtifact {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(url.to_string());
            PreviewArtifact::new(format!("{url}/preview.png"))
        }
    }

    struct CountingLabels {
        inner: LabelRegistry,
        tag_calls: AtomicUsize,
        type_calls: AtomicUsize,
    }

    #[async_trait]
    impl LabelRepository for CountingLabels {
        async fn get_or_create_tags(
            &self,
            labels: &[String],
        ) -> std::result::Result<Vec<LabelId>, LabelError> {
            self.tag_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_or_create_tags(labels).await
        }

        async fn get_or_create_type(&self, label: &str) -> std::result::Result<LabelId, LabelError> {
            self.type_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_or_create_type(label).await
        }
    }

    struct Harness {
        service: ContentService,
        previews: Arc<CountingPreviews>,
        labels: Arc<CountingLabels>,
        user: UserId,
        other_user: UserId,
    }

    impl Harness {
        fn reset_counts(&self) {
            self.previews.calls.store(0, Ordering::SeqCst);
            self.labels.tag_calls.store(0, Ordering::SeqCst);
            self.labels.type_calls.store(0, Ordering::SeqCst);
        }

        fn preview_calls(&self) -> usize {
            self.previews.calls.load(Ordering::SeqCst)
        }

        fn label_calls(&self) -> usize {
            self.labels.tag_calls.load(Ordering::SeqCst)
                + self.labels.type_calls.load(Ordering::SeqCst)
        }
    }

    async fn insert_user(db: &Database, name: &str) -> UserId {
        sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash) VALUES (?, ?, 'x') RETURNING id",
        )
        .bind(name)
        .bind(format!("{name}@example.com"))
        .fetch_one(db.pool())
        .await
        .unwrap()
    }

    async fn harness() -> Harness {
        let db = Database::new_in_memory().await.unwrap();
        let user = insert_user(&db, "alice").await;
        let other_user = insert_user(&db, "bob").await;

        let previews = Arc::new(CountingPreviews::default());
        let labels = Arc::new(CountingLabels {
            inner: LabelRegistry::new(db.clone()),
            tag_calls: AtomicUsize::new(0),
            type_calls: AtomicUsize::new(0),
        });
        let service = ContentService::new(
            ContentStore::new(db),
            Arc::clone(&labels) as Arc<dyn LabelRepository>,
            Arc::clone(&previews) as Arc<dyn PreviewSource>,
        );
        Harness {
            service,
            previews,
            labels,
            user,
            other_user,
        }
    }

    fn submission(link: &str, tags: &[&str]) -> NewContent {
        NewContent {
            title: "Saved".to_string(),
            link: link.to_string(),
            content_type: "article".to_string(),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_populates_preview_type_and_tags() {
        let h = harness().await;

        let record = h
            .service
            .create(h.user, submission("https://example.com/a", &["x", "y"]))
            .await
            .unwrap();

        assert_eq!(record.image_url, "https://example.com/a/preview.png");
        assert_eq!(record.content_type.label, "article");
        assert_eq!(record.tag_labels(), vec!["x", "y"]);
        assert_eq!(record.user_id, h.user);
        assert_eq!(h.preview_calls(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_link() {
        let h = harness().await;

        let err = h
            .service
            .create(h.user, submission("   ", &[]))
            .await
            .unwrap_err();

        assert!(matches!(err, ContentError::Invalid { field: "link", .. }));
        assert_eq!(h.preview_calls(), 0);
    }

    #[tokio::test]
    async fn test_reordered_tags_update_does_no_work() {
        let h = harness().await;
        let record = h
            .service
            .create(h.user, submission("https://example.com/a", &["x", "y"]))
            .await
            .unwrap();
        h.reset_counts();

        let updated = h
            .service
            .update(
                h.user,
                record.id,
                ContentUpdate {
                    title: Some(record.title.clone()),
                    link: Some(record.link.clone()),
                    content_type: None,
                    tags: Some(vec!["y".to_string(), "x".to_string()]),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated, record);
        assert_eq!(h.preview_calls(), 0);
        assert_eq!(h.label_calls(), 0);
    }

    #[tokio::test]
    async fn test_link_change_resolves_preview_once() {
        let h = harness().await;
        let record = h
            .service
            .create(h.user, submission("https://example.com/a", &["x"]))
            .await
            .unwrap();
        h.reset_counts();

        let updated = h
            .service
            .update(
                h.user,
                record.id,
                ContentUpdate {
                    link: Some("https://example.com/b".to_string()),
                    ..ContentUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(h.preview_calls(), 1);
        assert_eq!(h.label_calls(), 0);
        assert_eq!(updated.link, "https://example.com/b");
        assert_eq!(updated.image_url, "https://example.com/b/preview.png");
        assert_eq!(updated.tag_labels(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_tag_change_rewrites_tags_in_order() {
        let h = harness().await;
        let record = h
            .service
            .create(h.user, submission("https://example.com/a", &["x", "y"]))
            .await
            .unwrap();
        h.reset_counts();

        let updated = h
            .service
            .update(
                h.user,
                record.id,
                ContentUpdate {
                    tags: Some(vec!["z".to_string(), "x".to_string()]),
                    ..ContentUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.tag_labels(), vec!["z", "x"]);
        assert_eq!(h.labels.tag_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.labels.type_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.preview_calls(), 0);
    }

    #[tokio::test]
    async fn test_type_change_resolves_type_only() {
        let h = harness().await;
        let record = h
            .service
            .create(h.user, submission("https://example.com/a", &["x"]))
            .await
            .unwrap();
        h.reset_counts();

        let updated = h
            .service
            .update(
                h.user,
                record.id,
                ContentUpdate {
                    content_type: Some("video".to_string()),
                    ..ContentUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.content_type.label, "video");
        assert_eq!(h.labels.type_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.labels.tag_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_of_foreign_record_is_not_found() {
        let h = harness().await;
        let record = h
            .service
            .create(h.user, submission("https://example.com/a", &[]))
            .await
            .unwrap();

        let err = h
            .service
            .update(
                h.other_user,
                record.id,
                ContentUpdate {
                    title: Some("mine now".to_string()),
                    ..ContentUpdate::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ContentError::NotFound(id) if id == record.id));
    }

    #[tokio::test]
    async fn test_delete_is_owner_scoped() {
        let h = harness().await;
        let record = h
            .service
            .create(h.user, submission("https://example.com/a", &[]))
            .await
            .unwrap();

        assert!(matches!(
            h.service.delete(h.other_user, record.id).await,
            Err(ContentError::NotFound(_))
        ));
        h.service.delete(h.user, record.id).await.unwrap();
        assert!(h.service.list(h.user).await.unwrap().is_empty());
        assert!(matches!(
            h.service.delete(h.user, record.id).await,
            Err(ContentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_types_and_by_type() {
        let h = harness().await;
        let article = h
            .service
            .create(h.user, submission("https://example.com/a", &[]))
            .await
            .unwrap();
        let mut video = submission("https://example.com/v", &["clip"]);
        video.content_type = "video".to_string();
        let video = h.service.create(h.user, video).await.unwrap();
        h.service
            .create(h.user, submission("https://example.com/b", &[]))
            .await
            .unwrap();

        let types = h.service.types(h.user).await.unwrap();
        let labels: Vec<_> = types.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["article", "video"]);

        let videos = h
            .service
            .by_type(h.user, video.content_type.id)
            .await
            .unwrap();
        assert_eq!(videos, vec![video]);

        let articles = h
            .service
            .by_type(h.user, article.content_type.id)
            .await
            .unwrap();
        assert_eq!(articles.len(), 2);
        assert!(h.service.types(h.other_user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_per_user() {
        let h = harness().await;
        h.service
            .create(h.user, submission("https://example.com/a", &["x"]))
            .await
            .unwrap();
        h.service
            .create(h.other_user, submission("https://example.com/b", &["y"]))
            .await
            .unwrap();

        let mine = h.service.list(h.user).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].link, "https://example.com/a");
        assert_eq!(mine[0].tag_labels(), vec!["x"]);
        assert_eq!(
            h.previews.seen.lock().unwrap().as_slice(),
            ["https://example.com/a", "https://example.com/b"]
        );
    }
}
