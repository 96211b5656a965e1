use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::app::{CourierError, Result};
use crate::notify::{MailMessage, MailSender};

pub const DEFAULT_ENDPOINT: &str = "https://api.mailchannels.net/tx/v1/send";

/// Sends mail through the MailChannels HTTP API. Only `202 Accepted` counts
/// as delivered.
pub struct MailChannelsSender {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl MailChannelsSender {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

pub fn request_body(message: &MailMessage) -> Value {
    let to: Vec<Value> = message.to.iter().map(|email| json!({ "email": email })).collect();

    json!({
        "personalizations": [{ "to": to }],
        "from": { "email": message.from },
        "subject": message.subject,
        "content": [{ "type": "text/html", "value": message.html_body }],
    })
}

#[async_trait]
impl MailSender for MailChannelsSender {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        let mut request = self.client.post(&self.endpoint).json(&request_body(message));
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CourierError::Send("request timed out".to_string())
            } else {
                CourierError::Send(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(CourierError::Send(format!("HTTP {}: {}", status, text)))
    }
}
