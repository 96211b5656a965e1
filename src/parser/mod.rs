use chrono::Utc;
use feed_rs::model::Link;
use feed_rs::parser;
use html_escape::decode_html_entities;

use crate::app::{CourierError, Result};
use crate::domain::entry::UNKNOWN_FEED;
use crate::domain::RawEntry;

/// A parsed feed: its display title and its entries in document order.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: String,
    pub entries: Vec<RawEntry>,
}

/// Turns RSS 0.9x/1.0/2.0, Atom and JSON Feed documents into [`RawEntry`]
/// values.
///
/// Missing item fields are left as `None`; an item with neither guid, link
/// nor title gets an empty `candidate_id` and is dropped later by the engine.
#[derive(Clone)]
pub struct FeedParser;

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// The entry's own page: the first `alternate` (or untyped) link, else the
/// first link of any kind.
fn entry_link(links: Vec<Link>) -> Option<String> {
    let alternate = links
        .iter()
        .position(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .unwrap_or(0);
    links
        .into_iter()
        .nth(alternate)
        .and_then(|l| non_empty(l.href))
}

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, body: &[u8]) -> Result<ParsedFeed> {
        // Only real guids count as ids; feed-rs would otherwise synthesize
        // one from link and title for items that have none.
        let feed = parser::Builder::new()
            .id_generator(|_links, _title, _uri| String::new())
            .build()
            .parse(body)
            .map_err(|e| CourierError::FeedParse(e.to_string()))?;

        let feed_title = feed
            .title
            .and_then(|t| non_empty(decode_html_entities(&t.content).to_string()))
            .unwrap_or_else(|| UNKNOWN_FEED.to_string());

        let entries = feed
            .entries
            .into_iter()
            .map(|entry| {
                let title = entry
                    .title
                    .and_then(|t| non_empty(decode_html_entities(&t.content).to_string()));
                let link = entry_link(entry.links);
                let candidate_id =
                    RawEntry::candidate_id(Some(&entry.id), link.as_deref(), title.as_deref());

                RawEntry {
                    candidate_id,
                    title,
                    link,
                    published_at: entry
                        .published
                        .or(entry.updated)
                        .map(|dt| dt.with_timezone(&Utc)),
                    author: entry
                        .authors
                        .into_iter()
                        .next()
                        .and_then(|a| non_empty(a.name)),
                    feed_title: feed_title.clone(),
                }
            })
            .collect();

        Ok(ParsedFeed {
            title: feed_title,
            entries,
        })
    }
}
