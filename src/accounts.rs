//! Account lifecycle: OTP-gated signup and password signin.
//!
//! Signup never writes a user row. It parks the validated registration in the
//! [`SignupCache`] under the email address and mails a six-digit code; only
//! [`AccountService::verify_otp`] with that code creates the account.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use validator::ValidateEmail;

use crate::auth::{AuthError, TokenIssuer, hash_password, verify_password};
use crate::db::{Database, DbErrorKind, is_unique_violation};
use crate::entities::{User, UserId};
use crate::mail::{MailError, OtpMailer};
use crate::signup_cache::{CacheError, PendingSignup, SignupCache, TakeOutcome};

pub const MIN_USERNAME_CHARS: usize = 3;
pub const MIN_PASSWORD_CHARS: usize = 8;
const OTP_RANGE: std::ops::RangeInclusive<u32> = 100_000..=999_999;

/// Account errors.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("OTP expired or not requested")]
    OtpExpired,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("account database error ({kind}): {message}")]
    Database { kind: DbErrorKind, message: String },
}

impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AccountError>;

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    /// Checks username length, email syntax and password strength.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Validation`] naming the first failed rule.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().chars().count() < MIN_USERNAME_CHARS {
            return Err(AccountError::Validation(format!(
                "Username must be at least {MIN_USERNAME_CHARS} characters"
            )));
        }
        if !self.email.validate_email() {
            return Err(AccountError::Validation("Invalid email address".to_string()));
        }
        validate_password(&self.password)
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AccountError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AccountError::Validation(
            "Password must contain at least one uppercase letter".to_string(),
        ));
    }
    // Underscore and any non-ASCII character count as special.
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        return Err(AccountError::Validation(
            "Password must contain at least one special character".to_string(),
        ));
    }
    Ok(())
}

fn generate_otp() -> String {
    rand::thread_rng().gen_range(OTP_RANGE).to_string()
}

async fn hash_off_thread(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(AccountError::from)
}

async fn verify_off_thread(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(AccountError::from)
}

/// Signup, verification and signin.
#[derive(Clone)]
pub struct AccountService {
    db: Database,
    cache: Arc<dyn SignupCache>,
    mailer: Arc<dyn OtpMailer>,
    tokens: Arc<TokenIssuer>,
    otp_ttl: Duration,
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService")
            .field("otp_ttl", &self.otp_ttl)
            .finish_non_exhaustive()
    }
}

impl AccountService {
    #[must_use]
    pub fn new(
        db: Database,
        cache: Arc<dyn SignupCache>,
        mailer: Arc<dyn OtpMailer>,
        tokens: Arc<TokenIssuer>,
        otp_ttl: Duration,
    ) -> Self {
        Self {
            db,
            cache,
            mailer,
            tokens,
            otp_ttl,
        }
    }

    async fn conflict(&self, username: &str, email: &str) -> Result<Option<AccountError>> {
        let (username_taken, email_taken): (bool, bool) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?), \
                    EXISTS(SELECT 1 FROM users WHERE email = ?)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(self.db.pool())
        .await?;

        Ok(if username_taken {
            Some(AccountError::UsernameTaken)
        } else if email_taken {
            Some(AccountError::EmailTaken)
        } else {
            None
        })
    }

    /// Validates a registration, parks it and mails a verification code.
    ///
    /// A repeated signup for the same email replaces the earlier code.
    ///
    /// # Errors
    ///
    /// Returns a validation or conflict error for bad input, or a cache,
    /// mail or database error.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn signup(&self, request: SignupRequest) -> Result<()> {
        request.validate()?;
        if let Some(conflict) = self.conflict(&request.username, &request.email).await? {
            return Err(conflict);
        }

        let pending = PendingSignup {
            password_hash: hash_off_thread(request.password).await?,
            username: request.username,
            email: request.email,
            otp: generate_otp(),
        };
        self.cache.put(&pending, self.otp_ttl).await?;
        self.mailer
            .send_otp(&pending.email, &pending.otp, self.otp_ttl.as_secs())
            .await?;
        info!("Signup pending verification");
        Ok(())
    }

    /// Redeems a verification code, creating the account.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::InvalidOtp`] for a wrong code,
    /// [`AccountError::OtpExpired`] when nothing is pending, or a conflict if
    /// the username or email was registered in the meantime.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn verify_otp(&self, request: VerifyOtpRequest) -> Result<String> {
        if request.email.trim().is_empty() || request.otp.trim().is_empty() {
            return Err(AccountError::Validation(
                "Email and OTP are required".to_string(),
            ));
        }

        let pending = match self.cache.take(&request.email, request.otp.trim()).await? {
            TakeOutcome::Taken(pending) => pending,
            TakeOutcome::Mismatch => return Err(AccountError::InvalidOtp),
            TakeOutcome::Missing => return Err(AccountError::OtpExpired),
        };

        let inserted = sqlx::query_scalar::<_, UserId>(
            "INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&pending.username)
        .bind(&pending.email)
        .bind(&pending.password_hash)
        .fetch_one(self.db.pool())
        .await;

        let user_id = match inserted {
            Ok(id) => id,
            Err(err) if is_unique_violation(&err) => {
                debug!("Account registered concurrently");
                return Err(self
                    .conflict(&pending.username, &pending.email)
                    .await?
                    .unwrap_or(AccountError::EmailTaken));
            }
            Err(err) => {
                self.restore_pending(&pending).await;
                return Err(err.into());
            }
        };

        info!(%user_id, "Account created");
        Ok(self.tokens.issue(user_id)?)
    }

    /// Puts a redeemed signup back after a failed insert, with a fresh TTL.
    async fn restore_pending(&self, pending: &PendingSignup) {
        if let Err(error) = self.cache.put(pending, self.otp_ttl).await {
            warn!(%error, "Failed to restore pending signup after database error");
        }
    }

    /// Exchanges email and password for a token.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::InvalidCredentials`] for an unknown email or a
    /// wrong password.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn signin(&self, request: SigninRequest) -> Result<String> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash FROM users WHERE email = ?",
        )
        .bind(&request.email)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or(AccountError::InvalidCredentials)?;

        if !verify_off_thread(request.password, user.password_hash).await? {
            return Err(AccountError::InvalidCredentials);
        }

        debug!(user_id = %user.id, "Signed in");
        Ok(self.tokens.issue(user.id)?)
    }
}
