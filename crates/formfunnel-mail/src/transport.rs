use crate::template::ComposedEmail;
use async_trait::async_trait;
use formfunnel_core::FormFunnelError;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

#[async_trait]
pub trait Mailer: Send + Sync + fmt::Debug {
    async fn send(&self, email: &ComposedEmail) -> Result<(), FormFunnelError>;
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    /// Implicit TLS. When false the connection is plaintext.
    pub secure: bool,
    pub username: String,
    pub password: String,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpMailer").field("host", &self.host).finish()
    }
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, FormFunnelError> {
        let builder = if settings.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| FormFunnelError::Mail(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };
        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            host: settings.host.clone(),
        })
    }
}

fn mailbox(address: &str) -> Result<Mailbox, FormFunnelError> {
    address
        .parse()
        .map_err(|e| FormFunnelError::Mail(format!("invalid address {address:?}: {e}")))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &ComposedEmail) -> Result<(), FormFunnelError> {
        let message = Message::builder()
            .from(mailbox(&email.config.from)?)
            .to(mailbox(&email.config.to)?)
            .subject(email.config.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.body.clone())
            .map_err(|e| FormFunnelError::Mail(e.to_string()))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| FormFunnelError::Mail(e.to_string()))?;
        info!("sent \"{}\" to {} via {}", email.config.subject, email.config.to, self.host);
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &ComposedEmail) -> Result<(), FormFunnelError> {
        info!(
            from = %email.config.from,
            to = %email.config.to,
            subject = %email.config.subject,
            bytes = email.body.len(),
            "mail delivery disabled, message logged only"
        );
        debug!(body = %email.body);
        Ok(())
    }
}

/// Keeps every message in memory instead of delivering it.
#[derive(Debug, Default)]
pub struct OutboxMailer {
    sent: Mutex<Vec<ComposedEmail>>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<ComposedEmail> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: &ComposedEmail) -> Result<(), FormFunnelError> {
        info!(
            from = %email.config.from,
            to = %email.config.to,
            subject = %email.config.subject,
            "queued message in outbox"
        );
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::MessageConfig;

    #[tokio::test]
    async fn outbox_keeps_messages_in_order() {
        let outbox = OutboxMailer::new();
        for subject in ["one", "two"] {
            let email = ComposedEmail {
                config: MessageConfig {
                    from: "a@example.org".into(),
                    to: "b@example.org".into(),
                    subject: subject.into(),
                },
                body: "<p>hi</p>".into(),
            };
            outbox.send(&email).await.expect("send");
        }
        let subjects: Vec<String> = outbox.sent().into_iter().map(|m| m.config.subject).collect();
        assert_eq!(subjects, ["one", "two"]);
    }

    #[tokio::test]
    async fn log_mailer_never_fails() {
        let email = ComposedEmail {
            config: MessageConfig {
                from: String::new(),
                to: "not an address".into(),
                subject: "s".into(),
            },
            body: String::new(),
        };
        LogMailer.send(&email).await.expect("send");
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(mailbox("Nodo <hola@example.org>").is_ok());
        assert!(mailbox("not an address").is_err());
    }

    #[test]
    fn builds_plaintext_transport_without_network() {
        let mailer = SmtpMailer::new(&SmtpSettings {
            host: "localhost".into(),
            port: 2525,
            secure: false,
            username: "user".into(),
            password: "pass".into(),
        })
        .expect("mailer");
        assert!(format!("{mailer:?}").contains("localhost"));
    }
}
