//! SMTP mailer

use super::error::SendError;
use super::mime::{Attachment, EmailMessage};
use super::smtp::{SessionParams, SmtpSession};
use super::{ChannelClient, ConnectionCheck};
use crate::config::MailConfig;
use crate::dispatch::SendJob;
use crate::types::Channel;
use async_trait::async_trait;
use chrono::Utc;

/// Sends campaign email, one SMTP session per message
pub struct Mailer {
    config: MailConfig,
    simulate_when_unconfigured: bool,
}

impl Mailer {
    /// Create a mailer
    pub fn new(config: MailConfig, simulate_when_unconfigured: bool) -> Self {
        Self {
            config,
            simulate_when_unconfigured,
        }
    }

    /// Connect, negotiate TLS, authenticate and quit
    pub async fn test_connection(&self) -> ConnectionCheck {
        let (Some(username), Some(password)) = self.credentials() else {
            return ConnectionCheck {
                success: false,
                message: "credentials not configured".to_string(),
            };
        };

        let result = async {
            let mut session = SmtpSession::open(self.session_params()).await?;
            session.authenticate(username, password).await?;
            session.quit().await;
            Ok::<_, SendError>(())
        }
        .await;

        match result {
            Ok(()) => ConnectionCheck {
                success: true,
                message: format!(
                    "connected to {}:{}",
                    self.config.smtp_host, self.config.smtp_port
                ),
            },
            Err(e) => ConnectionCheck {
                success: false,
                message: e.to_string(),
            },
        }
    }

    fn credentials(&self) -> (Option<&str>, Option<&str>) {
        if !self.config.has_credentials() {
            return (None, None);
        }
        (self.config.username.as_deref(), self.config.password.as_deref())
    }

    fn session_params(&self) -> SessionParams<'_> {
        SessionParams {
            host: &self.config.smtp_host,
            port: self.config.smtp_port,
            implicit_tls: self.config.implicit_tls(),
            accept_invalid_certs: self.config.accept_invalid_certs,
            helo_domain: &self.config.helo_domain,
            timeout: self.config.timeout,
        }
    }

    async fn load_attachments(job: &SendJob) -> Vec<Attachment> {
        let mut attachments = Vec::with_capacity(job.attachments.len());
        for path in &job.attachments {
            match Attachment::from_path(path).await {
                Ok(attachment) => attachments.push(attachment),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "skipping unreadable attachment"
                ),
            }
        }
        attachments
    }
}

#[async_trait]
impl ChannelClient for Mailer {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, job: &SendJob) -> Result<(), SendError> {
        let recipient = job.recipient.trim();
        if recipient.is_empty() || !recipient.contains('@') {
            return Err(SendError::InvalidRecipient(job.recipient.clone()));
        }

        let (Some(username), Some(password)) = self.credentials() else {
            if self.simulate_when_unconfigured {
                tracing::info!(
                    to = recipient,
                    subject = job.subject.as_deref().unwrap_or_default(),
                    "SMTP credentials not configured, email logged only"
                );
                return Ok(());
            }
            return Err(SendError::NotConfigured(Channel::Email));
        };

        let from_address = self.config.sender_address().unwrap_or(username);
        let attachments = Self::load_attachments(job).await;
        let domain = from_address.rsplit('@').next().unwrap_or("localhost");
        let message = EmailMessage {
            from_name: &self.config.from_name,
            from_address,
            to: recipient,
            subject: job.subject.as_deref().unwrap_or_default(),
            text_body: &job.body,
            html_body: job.html_body.as_deref(),
            attachments: &attachments,
            date: Utc::now(),
            message_id: format!("<{}@{domain}>", uuid::Uuid::new_v4().simple()),
        }
        .render();

        let mut session = SmtpSession::open(self.session_params()).await?;
        session.authenticate(username, password).await?;
        session.send_mail(from_address, recipient, &message).await?;
        session.quit().await;

        tracing::debug!(to = recipient, vendor_id = %job.vendor_id, "email sent");
        Ok(())
    }
}
