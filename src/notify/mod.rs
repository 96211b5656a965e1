//! Notification dispatch.
//!
//! The dispatcher turns new entries into [`MailMessage`]s and hands them to a
//! [`MailSender`]. Delivery is at most once: entries are already recorded as
//! seen when dispatch starts, and a failed send is reported, not retried.

pub mod html;
pub mod log;
pub mod mailchannels;
pub mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::app::Result;
use crate::domain::entry::sort_newest_first;
use crate::domain::NewEntry;

pub use log::LogSender;
pub use mailchannels::MailChannelsSender;
pub use smtp::SmtpSender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

/// Transport capability: deliver one message or fail with `CourierError::Send`.
#[async_trait]
pub trait MailSender {
    async fn send(&self, message: &MailMessage) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// One message listing every new entry.
    #[default]
    Batch,
    /// One message per new entry, sent concurrently.
    PerEntry,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
}

/// Result of one send attempt and the entries it covered.
#[derive(Debug)]
pub struct SendOutcome {
    pub entry_ids: Vec<String>,
    pub result: Result<()>,
}

impl SendOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Dispatcher {
    sender: Arc<dyn MailSender + Send + Sync>,
    envelope: Envelope,
    delivery: Delivery,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn MailSender + Send + Sync>, envelope: Envelope, delivery: Delivery) -> Self {
        Self {
            sender,
            envelope,
            delivery,
        }
    }

    /// Send notifications for `entries`, newest first. One failed send never
    /// stops the others.
    pub async fn dispatch(&self, entries: &[NewEntry]) -> Vec<SendOutcome> {
        if entries.is_empty() {
            return Vec::new();
        }

        let mut entries = entries.to_vec();
        sort_newest_first(&mut entries);

        match self.delivery {
            Delivery::Batch => {
                let message = self.message(self.envelope.subject.clone(), &entries);
                let result = self.sender.send(&message).await;
                vec![self.outcome(&entries, result)]
            }
            Delivery::PerEntry => {
                let messages: Vec<MailMessage> = entries
                    .iter()
                    .map(|entry| {
                        let subject = format!("{}: {}", self.envelope.subject, entry.title);
                        self.message(subject, std::slice::from_ref(entry))
                    })
                    .collect();

                let results = join_all(messages.iter().map(|m| self.sender.send(m))).await;

                entries
                    .iter()
                    .zip(results)
                    .map(|(entry, result)| self.outcome(std::slice::from_ref(entry), result))
                    .collect()
            }
        }
    }

    fn message(&self, subject: String, entries: &[NewEntry]) -> MailMessage {
        MailMessage {
            from: self.envelope.from.clone(),
            to: self.envelope.to.clone(),
            subject,
            html_body: html::render(entries),
        }
    }

    fn outcome(&self, entries: &[NewEntry], result: Result<()>) -> SendOutcome {
        let entry_ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        match &result {
            Ok(()) => tracing::info!("Sent notification for {} entries", entry_ids.len()),
            Err(e) => tracing::warn!(
                "Notification for {} entries failed: {}",
                entry_ids.len(),
                e
            ),
        }
        SendOutcome { entry_ids, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::CourierError;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// Records every message; fails those whose subject contains `fail_on`.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<MailMessage>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl MailSender for RecordingSender {
        async fn send(&self, message: &MailMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            match &self.fail_on {
                Some(needle) if message.subject.contains(needle.as_str()) => {
                    Err(CourierError::Send("mailbox unavailable".into()))
                }
                _ => Ok(()),
            }
        }
    }

    fn entry(id: &str, millis: i64) -> NewEntry {
        NewEntry {
            id: id.into(),
            feed_title: "Feed".into(),
            feed_url: "https://feed.example/rss".into(),
            title: format!("Post {}", id),
            link: format!("https://feed.example/{}", id),
            published_at: Utc.timestamp_millis_opt(millis).unwrap(),
            author: None,
        }
    }

    fn envelope() -> Envelope {
        Envelope {
            from: "courier@example.com".into(),
            to: vec!["reader@example.com".into()],
            subject: "New Blog Posts".into(),
        }
    }

    #[test]
    fn test_no_entries_sends_nothing() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(sender.clone(), envelope(), Delivery::Batch);

        let outcomes = tokio_test::block_on(dispatcher.dispatch(&[]));
        assert!(outcomes.is_empty());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_batch_sends_one_message_newest_first() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(sender.clone(), envelope(), Delivery::Batch);

        let entries = vec![entry("t1", 1000), entry("t3", 3000), entry("t2", 2000)];
        let outcomes = tokio_test::block_on(dispatcher.dispatch(&entries));

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[0].entry_ids, vec!["t3", "t2", "t1"]);

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "New Blog Posts");
        assert_eq!(sent[0].to, vec!["reader@example.com"]);

        let body = &sent[0].html_body;
        let p3 = body.find("Post t3").unwrap();
        let p2 = body.find("Post t2").unwrap();
        let p1 = body.find("Post t1").unwrap();
        assert!(p3 < p2 && p2 < p1);
    }

    #[tokio::test]
    async fn test_per_entry_failure_is_isolated() {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
            fail_on: Some("Post b".into()),
        });
        let dispatcher = Dispatcher::new(sender.clone(), envelope(), Delivery::PerEntry);

        let entries = vec![entry("a", 1000), entry("b", 2000), entry("c", 3000)];
        let outcomes = dispatcher.dispatch(&entries).await;

        assert_eq!(outcomes.len(), 3);
        let by_id: Vec<(&str, bool)> = outcomes
            .iter()
            .map(|o| (o.entry_ids[0].as_str(), o.is_ok()))
            .collect();
        assert_eq!(by_id, vec![("c", true), ("b", false), ("a", true)]);

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().any(|m| m.subject == "New Blog Posts: Post c"));
    }

    #[tokio::test]
    async fn test_batch_failure_is_reported() {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
            fail_on: Some("New Blog Posts".into()),
        });
        let dispatcher = Dispatcher::new(sender, envelope(), Delivery::Batch);

        let outcomes = dispatcher.dispatch(&[entry("a", 1000)]).await;
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].result, Err(CourierError::Send(_))));
    }
}
