use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use crate::app::{CourierError, Result};
use crate::notify::{MailMessage, MailSender};

/// Sends mail through an SMTP relay using STARTTLS.
pub struct SmtpSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpSender {
    pub fn new(
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| CourierError::Config(format!("invalid SMTP host {}: {}", host, e)))?
            .port(port)
            .timeout(Some(timeout));

        if let Some((user, pass)) = credentials {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            mailer: builder.build(),
        })
    }
}

fn mailbox(addr: &str) -> Result<Mailbox> {
    addr.parse()
        .map_err(|e| CourierError::Send(format!("invalid address {}: {}", addr, e)))
}

/// Build the MIME message for `message`.
pub fn build_message(message: &MailMessage) -> Result<Message> {
    let mut builder = Message::builder()
        .from(mailbox(&message.from)?)
        .subject(message.subject.clone())
        .header(header::ContentType::TEXT_HTML);

    for to in &message.to {
        builder = builder.to(mailbox(to)?);
    }

    builder
        .body(message.html_body.clone())
        .map_err(|e| CourierError::Send(format!("build email: {}", e)))
}

#[async_trait]
impl MailSender for SmtpSender {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        let email = build_message(message)?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| CourierError::Send(format!("send email: {}", e)))?;

        tracing::debug!("SMTP accepted message '{}'", message.subject);
        Ok(())
    }
}
