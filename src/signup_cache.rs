//! Ephemeral storage for signups awaiting OTP verification.
//!
//! A pending signup and its code live in one entry so they expire together.
//! Taking an entry with the right code removes it atomically: a code can be
//! redeemed once, and a wrong code leaves the entry in place for a retry.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const KEY_PREFIX: &str = "linkhive:signup:";

/// Compare-and-delete: returns `{0, ''}` when absent, `{1, ''}` on a code
/// mismatch and `{2, payload}` after removing a matching entry.
const TAKE_SCRIPT: &str = r"
local raw = redis.call('GET', KEYS[1])
if not raw then
    return {0, ''}
end
local entry = cjson.decode(raw)
if entry['otp'] ~= ARGV[1] then
    return {1, ''}
end
redis.call('DEL', KEYS[1])
return {2, raw}
";

/// Signup cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("signup cache backend error: {0}")]
    Backend(#[from] RedisError),

    #[error("signup cache entry is not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// A registration waiting for its one-time code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSignup {
    pub username: String,
    pub email: String,
    /// Already hashed; the plain password never reaches the cache.
    pub password_hash: String,
    pub otp: String,
}

/// Result of redeeming a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeOutcome {
    /// The code matched; the entry is gone.
    Taken(PendingSignup),
    /// An entry exists but the code is wrong.
    Mismatch,
    /// Nothing pending for this email (never requested, expired or redeemed).
    Missing,
}

/// Short-lived store of pending signups keyed by email.
#[async_trait]
pub trait SignupCache: Send + Sync {
    /// Stores `pending`, replacing any earlier entry for the same email.
    async fn put(&self, pending: &PendingSignup, ttl: Duration) -> Result<()>;

    /// Removes and returns the entry for `email` if its code equals `otp`.
    async fn take(&self, email: &str, otp: &str) -> Result<TakeOutcome>;
}

fn cache_key(email: &str) -> String {
    format!("{KEY_PREFIX}{email}")
}

/// Redis-backed cache; entries expire server-side.
#[derive(Clone)]
pub struct RedisSignupCache {
    connection: ConnectionManager,
    take_script: redis::Script,
}

impl std::fmt::Debug for RedisSignupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSignupCache").finish_non_exhaustive()
    }
}

impl RedisSignupCache {
    /// Connects to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self::new(connection))
    }

    #[must_use]
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            take_script: redis::Script::new(TAKE_SCRIPT),
        }
    }
}

#[async_trait]
impl SignupCache for RedisSignupCache {
    async fn put(&self, pending: &PendingSignup, ttl: Duration) -> Result<()> {
        let payload = serde_json::to_string(pending)?;
        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(cache_key(&pending.email), payload, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn take(&self, email: &str, otp: &str) -> Result<TakeOutcome> {
        let mut conn = self.connection.clone();
        let (status, payload): (i64, String) = self
            .take_script
            .key(cache_key(email))
            .arg(otp)
            .invoke_async(&mut conn)
            .await?;

        take_outcome(status, &payload)
    }
}

/// Decodes the `{status, payload}` pair returned by [`TAKE_SCRIPT`].
fn take_outcome(status: i64, payload: &str) -> Result<TakeOutcome> {
    Ok(match status {
        2 => TakeOutcome::Taken(serde_json::from_str(payload)?),
        1 => TakeOutcome::Mismatch,
        _ => TakeOutcome::Missing,
    })
}

/// In-process cache for single-instance deployments and tests.
#[derive(Debug, Default)]
pub struct MemorySignupCache {
    entries: DashMap<String, (PendingSignup, Instant)>,
}

impl MemorySignupCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired entries.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
    }
}

#[async_trait]
impl SignupCache for MemorySignupCache {
    async fn put(&self, pending: &PendingSignup, ttl: Duration) -> Result<()> {
        self.purge_expired();
        self.entries.insert(
            pending.email.clone(),
            (pending.clone(), Instant::now() + ttl),
        );
        Ok(())
    }

    async fn take(&self, email: &str, otp: &str) -> Result<TakeOutcome> {
        let Entry::Occupied(entry) = self.entries.entry(email.to_string()) else {
            return Ok(TakeOutcome::Missing);
        };
        if entry.get().1 <= Instant::now() {
            debug!(email, "Pending signup expired");
            entry.remove();
            return Ok(TakeOutcome::Missing);
        }
        if entry.get().0.otp != otp {
            return Ok(TakeOutcome::Mismatch);
        }
        Ok(TakeOutcome::Taken(entry.remove().0))
    }
}
