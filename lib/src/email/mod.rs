//! Transactional email sending.
//!
//! Workflows talk to a [`Mailer`] and never care whether the message went
//! out through smtp or ended up in the log. Use [`dispatch`] for messages
//! whose failure must not affect the calling workflow.

use async_trait::async_trait;
use lettre::{
    address::AddressError,
    message::{Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{Config, Error, ErrorKind, Result};

pub mod list;
pub mod template;

pub use template::{Links, Rendered, Template};

/// Message addressed to a single recipient.
#[derive(Clone, Debug)]
pub struct Email {
    pub to: String,
    pub template: Template,
}

impl Email {
    pub fn new(to: impl Into<String>, template: Template) -> Self {
        Self {
            to: to.into(),
            template,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

/// Creates the mailer as defined in the config.
pub fn from_config(config: &Config) -> Result<Box<dyn Mailer>> {
    if config.email.enabled {
        Ok(Box::new(SmtpMailer::new(config)?))
    } else {
        log::warn!("email sending disabled, messages will only be logged");
        Ok(Box::new(LogMailer::new(config)))
    }
}

/// Sends the email, logging the outcome.
///
/// Returns whether the message was accepted. Errors are never propagated.
pub async fn dispatch(mailer: &dyn Mailer, email: Email) -> bool {
    let template = email.template.name();
    match mailer.send(&email).await {
        Ok(()) => {
            tracing::info!(to = %email.to, template, "email sent");
            true
        }
        Err(e) => {
            tracing::error!(to = %email.to, template, "failed sending email: {e}");
            false
        }
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    links: Links,
}

impl SmtpMailer {
    pub fn new(config: &Config) -> Result<Self> {
        let creds = Credentials::new(
            config.email.smtp_user.clone(),
            config.email.smtp_password.clone(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.email.smtp_server)
            .map_err(|e| Error::new(ErrorKind::Other(e.to_string())))?
            .port(config.email.smtp_port)
            .credentials(creds)
            .build();
        let from = format!("{} <{}>", config.email.sender_name, config.email.address)
            .parse()
            .map_err(|e: AddressError| Error::new(ErrorKind::EmailParseError(e.to_string())))?;

        Ok(Self {
            transport,
            from,
            links: Links::from(config),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let rendered = email.template.render(&self.links);
        let message = Message::builder()
            .from(self.from.clone())
            .to(email
                .to
                .parse()
                .map_err(|e: AddressError| Error::new(ErrorKind::EmailParseError(e.to_string())))?)
            .subject(rendered.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(rendered.plain))
                    .singlepart(SinglePart::html(rendered.html)),
            )?;

        let response = self.transport.send(message).await?;
        if response.is_positive() {
            Ok(())
        } else {
            Err(ErrorKind::EmailBadResponse(response.code().to_string()).into())
        }
    }
}

/// Writes messages to the log instead of sending them.
pub struct LogMailer {
    links: Links,
}

impl LogMailer {
    pub fn new(config: &Config) -> Self {
        Self {
            links: Links::from(config),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let rendered = email.template.render(&self.links);
        log::info!("email to {}: {}\n{}", email.to, rendered.subject, rendered.plain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingMailer;

    #[tokio::test]
    async fn dispatch_swallows_failures() {
        let mailer = RecordingMailer::failing_for("down@x.com");
        let template = Template::PlannerPurchase {
            first_name: "Ada".to_string(),
        };

        assert!(!dispatch(&mailer, Email::new("down@x.com", template.clone())).await);
        assert!(dispatch(&mailer, Email::new("up@x.com", template)).await);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "up@x.com");
    }
}
