use async_trait::async_trait;

use crate::app::Result;
use crate::notify::{MailMessage, MailSender};

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogSender;

#[async_trait]
impl MailSender for LogSender {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        tracing::info!(
            from = %message.from,
            to = %message.to.join(", "),
            "Notification: {}",
            message.subject
        );
        tracing::debug!("{}", message.html_body);
        Ok(())
    }
}
