//! Outbound email.
//!
//! [`Mailer`] is the seam task handlers send through; [`SmtpMailer`] is the
//! production implementation over lettre's async SMTP transport.

use crate::error::MailError;
use crate::task::VerifyEmailPayload;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt;

/// Subject line of the account verification email.
pub const VERIFY_EMAIL_SUBJECT: &str = "Welcome to Ticket - Verify your account";

/// A rendered HTML email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
}

/// Sends rendered emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message.
    ///
    /// # Errors
    ///
    /// - [`MailError::InvalidAddress`] if an address does not parse
    /// - [`MailError::Build`] if the message cannot be assembled
    /// - [`MailError::Transport`] if the SMTP exchange fails
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// SMTP settings.
#[derive(Clone)]
pub struct SmtpConfig {
    /// Relay host.
    ///
    /// Default: `smtp.gmail.com`
    pub host: String,

    /// Relay port (STARTTLS).
    ///
    /// Default: 587
    pub port: u16,

    /// Login, also used as the sender address.
    pub username: String,

    /// Login password (an app password for Gmail).
    pub password: String,

    /// Sender display name.
    ///
    /// Default: `Ticket`
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_name: "Ticket".to_string(),
        }
    }
}

impl SmtpConfig {
    /// Set the relay host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the relay port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set login credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the sender display name.
    #[must_use]
    pub fn with_from_name(mut self, from_name: impl Into<String>) -> Self {
        self.from_name = from_name.into();
        self
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from_name", &self.from_name)
            .finish()
    }
}

/// [`Mailer`] backed by an SMTP relay over STARTTLS.
///
/// Cheap to clone; one instance is shared by all workers.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer. No connection is made until the first send.
    ///
    /// # Errors
    ///
    /// - [`MailError::InvalidAddress`] if the sender address does not parse
    /// - [`MailError::Transport`] if the relay host is invalid
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from = format!("{} <{}>", config.from_name, config.username)
            .parse::<Mailbox>()
            .map_err(|e| MailError::InvalidAddress(format!("Invalid from address: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

impl fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| MailError::InvalidAddress(format!("Invalid to address: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .header(ContentType::TEXT_HTML)
            .body(message.html_body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::debug!(to = %message.to, "Email sent");
        Ok(())
    }
}

/// Render the account verification email.
#[must_use]
pub fn verify_email_message(payload: &VerifyEmailPayload) -> EmailMessage {
    let username = escape_html(&payload.username);
    let link = escape_html(&payload.link);

    let html_body = format!(
        r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Verify your account</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: #2563eb;">Welcome to Ticket, {username}!</h2>
        <p>Please confirm your email address to activate your account.</p>
        <p style="margin: 30px 0;">
            <a href="{link}"
               style="display: inline-block; background-color: #2563eb; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px;">
                Verify account
            </a>
        </p>
        <p style="color: #666; font-size: 14px;">
            If you didn't create an account, you can safely ignore this email.
        </p>
        <p style="color: #666; font-size: 12px; margin-top: 40px;">
            Or copy and paste this link into your browser:<br>
            {link}
        </p>
    </div>
</body>
</html>
"#
    );

    EmailMessage {
        to: payload.email.clone(),
        subject: VERIFY_EMAIL_SUBJECT.to_string(),
        html_body,
    }
}

/// Escape text for HTML element and attribute content.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn payload() -> VerifyEmailPayload {
        VerifyEmailPayload {
            email: "ann@example.com".into(),
            username: "ann".into(),
            link: "https://ticket.example.com/verify?code=abc&id=1".into(),
        }
    }

    #[test]
    fn test_verify_email_message() {
        let message = verify_email_message(&payload());

        assert_eq!(message.to, "ann@example.com");
        assert_eq!(message.subject, "Welcome to Ticket - Verify your account");
        assert!(message.html_body.contains("Welcome to Ticket, ann!"));
        assert!(message
            .html_body
            .contains("https://ticket.example.com/verify?code=abc&amp;id=1"));
    }

    #[test]
    fn test_user_fields_are_escaped() {
        let mut payload = payload();
        payload.username = "<script>alert('x')</script>".into();
        payload.link = "\"><img src=x>".into();

        let message = verify_email_message(&payload);

        assert!(!message.html_body.contains("<script>"));
        assert!(!message.html_body.contains("<img"));
        assert!(message
            .html_body
            .contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_sender() {
        let config = SmtpConfig::default().with_credentials("not an address", "pw");
        let err = SmtpMailer::new(&config).unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_smtp_mailer_rejects_bad_recipient() {
        let config = SmtpConfig::default().with_credentials("noreply@example.com", "pw");
        let mailer = SmtpMailer::new(&config).unwrap();

        let err = mailer
            .send(EmailMessage {
                to: "nobody".into(),
                subject: "s".into(),
                html_body: "b".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress(_)));
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = SmtpConfig::default().with_credentials("a@b.c", "hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("smtp.gmail.com"));
    }
}
