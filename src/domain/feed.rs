use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A subscribed feed, as kept by the feed list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Feed {
    pub fn new(url: String) -> Self {
        Self {
            id: 0,
            url,
            title: None,
            created_at: Utc::now(),
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }
}
