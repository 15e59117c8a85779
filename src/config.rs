//! Server configuration after flag and environment resolution.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use validator::ValidateEmail;

use crate::mail::SmtpSettings;
use crate::preview::{FetchTimeouts, VideoPreviewStyle};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE_PATH: &str = "linkhive.db";
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 24 * 7;
pub const DEFAULT_OTP_TTL_SECS: u64 = 300;

const TOKEN_TTL_HOURS_RANGE: std::ops::RangeInclusive<u64> = 1..=24 * 365;
const OTP_TTL_SECS_RANGE: std::ops::RangeInclusive<u64> = 30..=3600;
const FETCH_TIMEOUT_SECS_RANGE: std::ops::RangeInclusive<u64> = 1..=300;
const MIN_JWT_SECRET_BYTES: usize = 16;

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {field} value: {value}. Expected range: {expected}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        expected: String,
    },

    #[error(
        "What: JWT secret too short\nWhy: {actual} bytes given, at least {MIN_JWT_SECRET_BYTES} required\nFix: Set --jwt-secret or JWT_SECRET to a longer random string."
    )]
    WeakJwtSecret { actual: usize },

    #[error(
        "What: Fetch timeouts inconsistent\nWhy: connect timeout ({connect}s) exceeds total timeout ({total}s)\nFix: Use --fetch-connect-timeout-secs <= --fetch-timeout-secs."
    )]
    TimeoutOrder { connect: u64, total: u64 },

    #[error("Invalid SMTP sender address '{0}'")]
    SmtpSender(String),

    #[error("Invalid CORS origin '{0}': expected scheme://host[:port]")]
    CorsOrigin(String),
}

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub database_path: PathBuf,
    /// Absent: keep pending signups in process memory.
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    pub otp_ttl_secs: u64,
    /// Absent: log verification codes instead of mailing them.
    pub smtp: Option<SmtpSettings>,
    pub cors_origins: Vec<String>,
    pub video_style: VideoPreviewStyle,
    pub fetch_timeouts: FetchTimeouts,
}

impl ServerConfig {
    /// A configuration with defaults for everything but the secret.
    #[must_use]
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            redis_url: None,
            jwt_secret: jwt_secret.into(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            otp_ttl_secs: DEFAULT_OTP_TTL_SECS,
            smtp: None,
            cors_origins: Vec::new(),
            video_style: VideoPreviewStyle::default(),
            fetch_timeouts: FetchTimeouts::default(),
        }
    }

    /// Checks value ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::WeakJwtSecret {
                actual: self.jwt_secret.len(),
            });
        }
        check_range("token_ttl_hours", self.token_ttl_hours, &TOKEN_TTL_HOURS_RANGE)?;
        check_range("otp_ttl_secs", self.otp_ttl_secs, &OTP_TTL_SECS_RANGE)?;
        check_range(
            "fetch_connect_timeout_secs",
            self.fetch_timeouts.connect_secs,
            &FETCH_TIMEOUT_SECS_RANGE,
        )?;
        check_range(
            "fetch_timeout_secs",
            self.fetch_timeouts.total_secs,
            &FETCH_TIMEOUT_SECS_RANGE,
        )?;
        if self.fetch_timeouts.connect_secs > self.fetch_timeouts.total_secs {
            return Err(ConfigError::TimeoutOrder {
                connect: self.fetch_timeouts.connect_secs,
                total: self.fetch_timeouts.total_secs,
            });
        }
        if let Some(smtp) = &self.smtp
            && !smtp.from.validate_email()
        {
            return Err(ConfigError::SmtpSender(smtp.from.clone()));
        }
        for origin in &self.cors_origins {
            let valid = url::Url::parse(origin)
                .is_ok_and(|url| url.has_host() && matches!(url.scheme(), "http" | "https"));
            if !valid {
                return Err(ConfigError::CorsOrigin(origin.clone()));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn otp_ttl(&self) -> Duration {
        Duration::from_secs(self.otp_ttl_secs)
    }

    #[must_use]
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::try_from(self.token_ttl_hours).unwrap_or(i64::MAX))
    }
}

fn check_range(
    field: &'static str,
    value: u64,
    range: &std::ops::RangeInclusive<u64>,
) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: format!("{}..={}", range.start(), range.end()),
        })
    }
}
