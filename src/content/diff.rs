//! Field-level comparison between a stored record and an update request.
//!
//! Only fields that actually change are reported, so the caller can skip
//! preview resolution and registry lookups for everything else.

use crate::entities::ContentRecord;

use super::ContentUpdate;

/// Fields of an update that differ from the stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentChanges {
    pub title: Option<String>,
    pub link: Option<String>,
    pub content_type: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl ContentChanges {
    /// Compares `update` against `existing`. Absent fields count as unchanged.
    ///
    /// Tags compare as multisets: a reordering of the same labels is not a
    /// change.
    #[must_use]
    pub fn between(existing: &ContentRecord, update: &ContentUpdate) -> Self {
        let title = update
            .title
            .as_ref()
            .filter(|title| **title != existing.title)
            .cloned();
        let link = update
            .link
            .as_ref()
            .filter(|link| **link != existing.link)
            .cloned();
        let content_type = update
            .content_type
            .as_ref()
            .filter(|label| **label != existing.content_type.label)
            .cloned();
        let tags = update
            .tags
            .as_ref()
            .filter(|tags| !same_tag_set(tags, &existing.tag_labels()))
            .cloned();

        Self {
            title,
            link,
            content_type,
            tags,
        }
    }

    /// True when nothing needs to be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.link.is_none()
            && self.content_type.is_none()
            && self.tags.is_none()
    }
}

fn same_tag_set(requested: &[String], stored: &[String]) -> bool {
    if requested.len() != stored.len() {
        return false;
    }
    let mut requested: Vec<&str> = requested.iter().map(String::as_str).collect();
    let mut stored: Vec<&str> = stored.iter().map(String::as_str).collect();
    requested.sort_unstable();
    stored.sort_unstable();
    requested == stored
}
