use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const UNTITLED: &str = "Untitled";
pub const MISSING_LINK: &str = "#";
pub const UNKNOWN_FEED: &str = "Unknown Blog";

/// One item of a fetched feed, as produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// First non-empty of guid, link and title. Empty when none is usable.
    pub candidate_id: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub feed_title: String,
}

impl RawEntry {
    /// Pick the identifier used for deduplication.
    pub fn candidate_id(guid: Option<&str>, link: Option<&str>, title: Option<&str>) -> String {
        [guid, link, title]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    pub fn has_identity(&self) -> bool {
        !self.candidate_id.is_empty()
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED)
    }
}

/// Which identifier namespace `seenEntryIds` is keyed by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    /// Bare candidate ids shared by every feed. Two feeds publishing the same
    /// guid suppress each other.
    #[default]
    Global,
    /// Ids are qualified by the feed URL they came from.
    PerFeed,
}

impl DedupScope {
    pub fn key(&self, feed_url: &str, candidate_id: &str) -> String {
        match self {
            DedupScope::Global => candidate_id.to_string(),
            DedupScope::PerFeed => Self::feed_qualified_id(feed_url, candidate_id),
        }
    }

    /// Deterministic id from feed URL and entry id
    fn feed_qualified_id(feed_url: &str, candidate_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(feed_url.as_bytes());
        hasher.update(b"\n");
        hasher.update(candidate_id.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// An entry that passed the novelty test, ready for notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEntry {
    /// The key recorded in `seenEntryIds`.
    pub id: String,
    pub feed_title: String,
    pub feed_url: String,
    pub title: String,
    pub link: String,
    /// Stated publish time, or the run's `now` when the feed gave none.
    pub published_at: DateTime<Utc>,
    pub author: Option<String>,
}

impl NewEntry {
    pub fn from_raw(raw: RawEntry, id: String, feed_url: &str, published_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: raw.title.unwrap_or_else(|| UNTITLED.to_string()),
            link: raw.link.unwrap_or_else(|| MISSING_LINK.to_string()),
            feed_title: raw.feed_title,
            feed_url: feed_url.to_string(),
            published_at,
            author: raw.author,
        }
    }
}

/// Newest first; ties keep their discovery order.
pub fn sort_newest_first(entries: &mut [NewEntry]) {
    entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry_at(id: &str, millis: i64) -> NewEntry {
        NewEntry {
            id: id.into(),
            feed_title: "Feed".into(),
            feed_url: "https://example.com/feed.xml".into(),
            title: id.into(),
            link: MISSING_LINK.into(),
            published_at: Utc.timestamp_millis_opt(millis).unwrap(),
            author: None,
        }
    }

    #[test]
    fn test_candidate_id_prefers_guid() {
        let id = RawEntry::candidate_id(Some("guid-1"), Some("https://x/1"), Some("T"));
        assert_eq!(id, "guid-1");
    }

    #[test]
    fn test_candidate_id_falls_back_to_link_then_title() {
        assert_eq!(
            RawEntry::candidate_id(None, Some("https://x/1"), Some("T")),
            "https://x/1"
        );
        assert_eq!(RawEntry::candidate_id(Some(""), Some("  "), Some("T")), "T");
    }

    #[test]
    fn test_candidate_id_empty_when_nothing_usable() {
        assert_eq!(RawEntry::candidate_id(None, None, None), "");
        assert_eq!(RawEntry::candidate_id(Some(""), Some(""), Some(" ")), "");
    }

    #[test]
    fn test_global_scope_uses_bare_id() {
        let scope = DedupScope::Global;
        assert_eq!(scope.key("https://a/feed", "x"), "x");
        assert_eq!(scope.key("https://b/feed", "x"), "x");
    }

    #[test]
    fn test_per_feed_scope_separates_feeds() {
        let scope = DedupScope::PerFeed;
        let a = scope.key("https://a/feed", "x");
        let b = scope.key("https://b/feed", "x");
        assert_ne!(a, b);
        assert_eq!(a, scope.key("https://a/feed", "x"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_from_raw_applies_defaults() {
        let raw = RawEntry {
            candidate_id: "x".into(),
            title: None,
            link: None,
            published_at: None,
            author: None,
            feed_title: "Feed".into(),
        };
        let now = Utc.timestamp_millis_opt(5000).unwrap();
        let entry = NewEntry::from_raw(raw, "x".into(), "https://a/feed", now);

        assert_eq!(entry.title, UNTITLED);
        assert_eq!(entry.link, MISSING_LINK);
        assert_eq!(entry.published_at, now);
        assert_eq!(entry.feed_url, "https://a/feed");
    }

    #[test]
    fn test_sort_newest_first() {
        let mut entries = vec![entry_at("t1", 1000), entry_at("t3", 3000), entry_at("t2", 2000)];
        sort_newest_first(&mut entries);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t2", "t1"]);
    }
}
