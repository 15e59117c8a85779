//! Public share links: one unguessable token per user exposing their records.

use rand::RngCore;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::content::{ContentError, ContentStore};
use crate::db::{Database, DbErrorKind, is_unique_violation};
use crate::entities::{ContentRecord, UserId};

/// Random bytes per token; rendered as twice as many hex characters.
const TOKEN_BYTES: usize = 16;

/// How many fresh tokens to try before giving up on collisions.
const MAX_MINT_ATTEMPTS: usize = 3;

/// Share link errors.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("share link database error ({kind}): {message}")]
    Database { kind: DbErrorKind, message: String },

    #[error("could not mint a unique share token after {0} attempts")]
    Exhausted(usize),

    #[error(transparent)]
    Content(#[from] ContentError),
}

impl From<sqlx::Error> for ShareError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShareError>;

/// A user's share token and whether this call created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub token: String,
    pub created: bool,
}

fn mint_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Share-token storage and public lookup.
#[derive(Debug, Clone)]
pub struct ShareLinks {
    db: Database,
    contents: ContentStore,
}

impl ShareLinks {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            contents: ContentStore::new(db.clone()),
            db,
        }
    }

    async fn token_for(&self, user_id: UserId) -> Result<Option<String>> {
        Ok(
            sqlx::query_scalar("SELECT token FROM share_links WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(self.db.pool())
                .await?,
        )
    }

    /// Returns the user's token, minting one on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ShareError::Database`] on storage failure.
    #[instrument(skip_all, fields(%user_id))]
    pub async fn share(&self, user_id: UserId) -> Result<ShareLink> {
        if let Some(token) = self.token_for(user_id).await? {
            return Ok(ShareLink {
                token,
                created: false,
            });
        }

        for _ in 0..MAX_MINT_ATTEMPTS {
            let token = mint_token();
            match sqlx::query("INSERT INTO share_links (token, user_id) VALUES (?, ?)")
                .bind(&token)
                .bind(user_id)
                .execute(self.db.pool())
                .await
            {
                Ok(_) => {
                    info!("Created share link");
                    return Ok(ShareLink {
                        token,
                        created: true,
                    });
                }
                Err(err) if is_unique_violation(&err) => {
                    // Either a concurrent request shared first or the token collided.
                    if let Some(token) = self.token_for(user_id).await? {
                        debug!("Share link created concurrently");
                        return Ok(ShareLink {
                            token,
                            created: false,
                        });
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ShareError::Exhausted(MAX_MINT_ATTEMPTS))
    }

    /// Records visible through `token`. Unknown tokens yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ShareError::Database`] on storage failure.
    #[instrument(skip(self))]
    pub async fn shared_contents(&self, token: &str) -> Result<Vec<ContentRecord>> {
        let owner: Option<UserId> =
            sqlx::query_scalar("SELECT user_id FROM share_links WHERE token = ?")
                .bind(token)
                .fetch_optional(self.db.pool())
                .await?;
        match owner {
            Some(user_id) => Ok(self.contents.list_for_user(user_id).await?),
            None => {
                debug!("Unknown share token");
                Ok(Vec::new())
            }
        }
    }
}
