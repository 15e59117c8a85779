//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;

use linkhive::ServerConfig;
use linkhive::config::{
    DEFAULT_DATABASE_PATH, DEFAULT_OTP_TTL_SECS, DEFAULT_PORT, DEFAULT_TOKEN_TTL_HOURS,
};
use linkhive::mail::SmtpSettings;
use linkhive::preview::{FetchTimeouts, VideoPreviewStyle};

/// Save, tag and share links with automatic previews.
///
/// Every flag can also be set through the environment variable shown in
/// its help text.
#[derive(Parser, Debug)]
#[command(name = "linkhive")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = DEFAULT_DATABASE_PATH)]
    pub database: PathBuf,

    /// Redis URL for pending signups (in-process cache when unset)
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Secret for signing bearer tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Bearer token lifetime in hours
    #[arg(long, env = "TOKEN_TTL_HOURS", default_value_t = DEFAULT_TOKEN_TTL_HOURS)]
    pub token_ttl_hours: u64,

    /// Lifetime of a signup verification code in seconds
    #[arg(long, env = "OTP_TTL_SECS", default_value_t = DEFAULT_OTP_TTL_SECS)]
    pub otp_ttl_secs: u64,

    /// SMTP relay host (codes are logged instead of mailed when unset)
    #[arg(long, env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    /// SMTP relay port (STARTTLS default when unset)
    #[arg(long, env = "SMTP_PORT")]
    pub smtp_port: Option<u16>,

    /// SMTP username
    #[arg(long, env = "SMTP_USER")]
    pub smtp_user: Option<String>,

    /// SMTP password
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Sender address for verification mail
    #[arg(long, env = "SMTP_FROM")]
    pub smtp_from: Option<String>,

    /// Browser origin allowed to call the API (repeatable or comma-separated)
    #[arg(long = "cors-origin", env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Preview artifact for YouTube links
    #[arg(long, env = "YOUTUBE_PREVIEW", value_enum, default_value_t = VideoPreviewStyle::Thumbnail)]
    pub youtube_preview: VideoPreviewStyle,

    /// Connect timeout for preview page fetches in seconds
    #[arg(long, default_value_t = FetchTimeouts::default().connect_secs)]
    pub fetch_connect_timeout_secs: u64,

    /// Total timeout for preview page fetches in seconds
    #[arg(long, default_value_t = FetchTimeouts::default().total_secs)]
    pub fetch_timeout_secs: u64,
}

impl Args {
    /// Resolves the SMTP flags into settings; they are all-or-nothing.
    fn smtp_settings(&self) -> Result<Option<SmtpSettings>> {
        match (
            &self.smtp_host,
            &self.smtp_user,
            &self.smtp_password,
            &self.smtp_from,
        ) {
            (None, None, None, None) => Ok(None),
            (Some(host), Some(username), Some(password), Some(from)) => Ok(Some(SmtpSettings {
                host: host.clone(),
                port: self.smtp_port,
                username: username.clone(),
                password: password.clone(),
                from: from.clone(),
            })),
            _ => bail!(
                "What: Incomplete SMTP configuration\nWhy: --smtp-host, --smtp-user, --smtp-password and --smtp-from must be set together\nFix: Provide all four, or none to log verification codes instead."
            ),
        }
    }

    /// Builds and validates the server configuration.
    pub fn into_config(self) -> Result<ServerConfig> {
        let config = ServerConfig {
            smtp: self.smtp_settings()?,
            port: self.port,
            database_path: self.database,
            redis_url: self.redis_url.filter(|url| !url.trim().is_empty()),
            jwt_secret: self.jwt_secret,
            token_ttl_hours: self.token_ttl_hours,
            otp_ttl_secs: self.otp_ttl_secs,
            cors_origins: self
                .cors_origins
                .into_iter()
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            video_style: self.youtube_preview,
            fetch_timeouts: FetchTimeouts {
                connect_secs: self.fetch_connect_timeout_secs,
                total_secs: self.fetch_timeout_secs,
            },
        };
        config.validate()?;
        Ok(config)
    }
}
