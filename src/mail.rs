//! One-time code delivery.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{info, instrument};

const OTP_SUBJECT: &str = "Your LinkHive verification code";

/// Mail delivery errors.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn otp_body(otp: &str, ttl_secs: u64) -> String {
    format!(
        "Your verification code is {otp}.\n\nIt expires in {} minutes. If you did not sign up for LinkHive, ignore this message.\n",
        ttl_secs.div_ceil(60)
    )
}

/// Sends verification codes to prospective users.
#[async_trait]
pub trait OtpMailer: Send + Sync {
    /// Delivers `otp` to `to`; `ttl_secs` is quoted in the message.
    async fn send_otp(&self, to: &str, otp: &str, ttl_secs: u64) -> Result<(), MailError>;
}

/// SMTP settings for [`SmtpMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// STARTTLS SMTP relay delivery.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

impl SmtpMailer {
    /// Builds the relay transport. No connection is made until the first send.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] if the sender address or relay host is invalid.
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        if let Some(port) = settings.port {
            builder = builder.port(port);
        }
        Ok(Self {
            transport: builder.build(),
            from: mailbox(&settings.from)?,
        })
    }
}

#[async_trait]
impl OtpMailer for SmtpMailer {
    #[instrument(skip(self, otp))]
    async fn send_otp(&self, to: &str, otp: &str, ttl_secs: u64) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mailbox(to)?)
            .subject(OTP_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(otp_body(otp, ttl_secs))?;
        self.transport.send(message).await?;
        info!("Sent verification code");
        Ok(())
    }
}

/// Writes codes to the log instead of mailing them. For local development.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl OtpMailer for LogMailer {
    async fn send_otp(&self, to: &str, otp: &str, ttl_secs: u64) -> Result<(), MailError> {
        mailbox(to)?;
        info!(to, otp, ttl_secs, "Verification code (SMTP not configured)");
        Ok(())
    }
}
