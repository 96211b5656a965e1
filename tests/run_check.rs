use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use courier::app::{CourierError, Result};
use courier::checker::{CheckOptions, Checker};
use courier::fetcher::parallel::ParallelFetcher;
use courier::fetcher::Fetcher;
use courier::notify::{Delivery, Dispatcher, Envelope, MailMessage, MailSender};
use courier::store::{CheckpointStore, SqliteStore};

const BLOG: &str = "https://blog.example/rss.xml";
const NEWS: &str = "https://news.example/atom.xml";

const BLOG_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Example Blog</title>
  <item><title>Old post</title><link>https://blog.example/old</link>
    <guid>blog-old</guid><pubDate>Sun, 31 Dec 2023 12:00:00 GMT</pubDate></item>
  <item><title>New post</title><link>https://blog.example/new</link>
    <guid>blog-new</guid><pubDate>Tue, 02 Jan 2024 12:00:00 GMT</pubDate></item>
  <item><title>Newest post</title><link>https://blog.example/newest</link>
    <pubDate>Wed, 03 Jan 2024 08:00:00 GMT</pubDate></item>
  <item><description>No way to tell this one apart</description></item>
</channel></rss>"#;

const NEWS_ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example News</title>
  <id>urn:news</id>
  <updated>2024-01-02T00:00:00Z</updated>
  <entry>
    <title>Headline</title>
    <link href="https://news.example/headline"/>
    <id>urn:news:1</id>
    <updated>2024-01-02T06:00:00Z</updated>
  </entry>
</feed>"#;

struct StaticFetcher(HashMap<&'static str, &'static str>);

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.0
            .get(url)
            .map(|body| body.as_bytes().to_vec())
            .ok_or_else(|| CourierError::Fetch {
                url: url.to_string(),
                reason: "HTTP status 503 Service Unavailable".into(),
            })
    }
}

#[derive(Default)]
struct Outbox(Mutex<Vec<MailMessage>>);

#[async_trait]
impl MailSender for Outbox {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        self.0.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn checker(db: &Path, feeds: HashMap<&'static str, &'static str>, outbox: Arc<Outbox>) -> Checker {
    Checker::new(
        Arc::new(vec![BLOG.to_string(), NEWS.to_string()]),
        Arc::new(SqliteStore::new(db).unwrap()),
        ParallelFetcher::new(Arc::new(StaticFetcher(feeds))),
        Dispatcher::new(
            outbox,
            Envelope {
                from: "courier@example.com".into(),
                to: vec!["reader@example.com".into()],
                subject: "New Blog Posts".into(),
            },
            Delivery::Batch,
        ),
        CheckOptions::default(),
    )
}

#[tokio::test]
async fn test_entries_are_reported_once_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("courier.db");

    // Seed a checkpoint from the start of the year
    {
        let store = SqliteStore::new(&db).unwrap();
        let mut checkpoint = store.load().unwrap();
        checkpoint.state.last_check_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store.save(&checkpoint).unwrap();
    }

    let feeds: HashMap<_, _> = [(BLOG, BLOG_RSS), (NEWS, NEWS_ATOM)].into_iter().collect();
    let outbox = Arc::new(Outbox::default());

    let first = checker(&db, feeds.clone(), outbox.clone())
        .run_check_at(Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap())
        .await
        .unwrap();

    let ids: Vec<&str> = first.new_entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["https://blog.example/newest", "blog-new", "urn:news:1"]
    );

    {
        let sent = outbox.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let body = &sent[0].html_body;
        assert!(body.contains("Found 3 new blog posts:"));
        // Newest first
        let newest = body.find("Newest post").unwrap();
        let new = body.find("New post").unwrap();
        let headline = body.find("Headline").unwrap();
        assert!(newest < new && new < headline);
        assert!(!body.contains("Old post"));
    }

    // A fresh process over the same database sees nothing new
    let second = checker(&db, feeds, outbox.clone())
        .run_check_at(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap())
        .await
        .unwrap();
    assert!(second.new_entries.is_empty());
    assert_eq!(outbox.0.lock().unwrap().len(), 1);

    let stored = SqliteStore::new(&db).unwrap().load().unwrap();
    assert_eq!(stored.state.seen_entry_ids.len(), 3);
    assert_eq!(
        stored.state.last_check_time,
        Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap()
    );
    assert_eq!(stored.revision, 3);
}

#[tokio::test]
async fn test_outage_of_one_feed_keeps_the_other_flowing() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("courier.db");
    let outbox = Arc::new(Outbox::default());

    let feeds: HashMap<_, _> = [(NEWS, NEWS_ATOM)].into_iter().collect();
    let report = checker(&db, feeds, outbox.clone())
        .run_check_at(Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap())
        .await
        .unwrap();

    assert_eq!(report.feed_failures.len(), 1);
    assert_eq!(report.feed_failures[0].url, BLOG);
    assert_eq!(report.new_entries.len(), 1);
    assert_eq!(outbox.0.lock().unwrap().len(), 1);

    let stored = SqliteStore::new(&db).unwrap().load().unwrap();
    assert!(stored.state.is_seen("urn:news:1"));
}
