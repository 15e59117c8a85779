//! Core entities shared across storage, workflow and HTTP layers.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

row_id!(
    /// Identifier of a registered user.
    UserId
);
row_id!(
    /// Identifier of a tag or type registry entry.
    LabelId
);
row_id!(
    /// Identifier of a saved content record.
    ContentId
);

/// A resolved registry entry: tag or type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Label {
    pub id: LabelId,
    pub label: String,
}

/// A saved link with its resolved preview, type and tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub id: ContentId,
    pub title: String,
    pub link: String,
    /// Preview artifact: image URL, embeddable markup, or empty.
    pub image_url: String,
    #[serde(rename = "type")]
    pub content_type: Label,
    /// Tags in submission order.
    pub tags: Vec<Label>,
    pub user_id: UserId,
}

impl ContentRecord {
    /// Tag labels in stored order.
    #[must_use]
    pub fn tag_labels(&self) -> Vec<String> {
        self.tags.iter().map(|tag| tag.label.clone()).collect()
    }
}

/// A registered account as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}
