use std::path::Path;

use tokio::sync::watch;
use url::Url;

use crate::app::{AppContext, CourierError, Result};
use crate::domain::{Checkpoint, Feed, NewEntry};
use crate::scheduler::{parse_interval, shutdown_signal, Scheduler};
use crate::store::{CheckpointStore, FeedStore};

/// Only http(s) URLs can be fetched.
fn validate_feed_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url.trim())?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(CourierError::Config(format!(
            "Unsupported URL scheme '{}': {}",
            other, url
        ))),
    }
}

/// Add a feed. Returns false if it was already subscribed.
pub fn add_feed(ctx: &AppContext, url: &str, title: Option<String>) -> Result<bool> {
    let url = validate_feed_url(url)?;

    if ctx.store.get_feed_by_url(&url)?.is_some() {
        println!("Feed already exists: {}", url);
        return Ok(false);
    }

    let mut feed = Feed::new(url.clone());
    feed.title = title;
    ctx.store.add_feed(&feed)?;
    println!("Added feed: {}", url);
    Ok(true)
}

pub fn remove_feed(ctx: &AppContext, url: &str) -> Result<()> {
    let url = validate_feed_url(url)?;
    let feed = ctx
        .store
        .get_feed_by_url(&url)?
        .ok_or_else(|| CourierError::FeedNotFound(url.clone()))?;

    ctx.store.delete_feed(feed.id)?;
    println!("Removed feed: {}", url);
    Ok(())
}

pub fn list_feeds(ctx: &AppContext) -> Result<()> {
    let feeds = ctx.store.get_all_feeds()?;

    if feeds.is_empty() {
        println!("No feeds");
        return Ok(());
    }

    for feed in feeds {
        println!("{}\n  {}", feed.display_title(), feed.url);
    }

    Ok(())
}

/// Import feeds from an OPML file
pub fn import_opml(ctx: &AppContext, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let feeds = parse_opml(&content);

    if feeds.is_empty() {
        println!("No feeds found in OPML file");
        return Ok(());
    }

    println!("Found {} feeds in OPML file", feeds.len());

    let mut added = 0;
    let mut skipped = 0;
    let mut errors = 0;

    for (title, url) in feeds {
        match add_feed(ctx, &url, Some(title.clone())) {
            Ok(true) => added += 1,
            Ok(false) => skipped += 1,
            Err(e) => {
                eprintln!("  ! {} - {}", title, e);
                errors += 1;
            }
        }
    }

    println!(
        "\nImport complete: {} added, {} skipped (already exist), {} errors",
        added, skipped, errors
    );

    Ok(())
}

/// Parse OPML content and extract feed titles and URLs
fn parse_opml(content: &str) -> Vec<(String, String)> {
    let mut feeds = Vec::new();

    for line in content.lines() {
        if line.contains("xmlUrl") {
            if let Some(url) = extract_attr(line, "xmlUrl") {
                let title = extract_attr(line, "title")
                    .or_else(|| extract_attr(line, "text"))
                    .unwrap_or_else(|| url.clone());
                feeds.push((title, url));
            }
        }
    }

    feeds
}

/// Extract an attribute value from an XML element string
fn extract_attr(line: &str, attr: &str) -> Option<String> {
    let pattern = format!(" {}=\"", attr);
    let start = line.find(&pattern)? + pattern.len();
    let rest = &line[start..];
    let end = rest.find('"')?;
    let value = &rest[..end];
    Some(html_escape::decode_html_entities(value).to_string())
}

/// Run one check and print what happened. Fails if the run failed.
pub async fn check(ctx: &AppContext) -> Result<()> {
    let checker = ctx.checker()?;
    let report = checker.run_check().await?;

    for failure in &report.feed_failures {
        eprintln!("  Error updating {}: {}", failure.url, failure.error);
    }

    for entry in &report.new_entries {
        println!("{}", entry_line(entry));
    }

    if checker.options().dry_run {
        println!("Dry run: nothing sent, checkpoint unchanged");
    }

    println!("Check complete: {}", report.summary());
    Ok(())
}

fn entry_line(entry: &NewEntry) -> String {
    let mut line = format!(
        "{} {}: {}",
        entry.published_at.format("%Y-%m-%d"),
        entry.feed_title,
        entry.title
    );
    if let Some(author) = &entry.author {
        line.push_str(&format!(" (by {})", author));
    }
    line
}

pub async fn serve(ctx: &AppContext) -> Result<()> {
    let interval_secs = parse_interval(&ctx.config.schedule.interval).map_err(CourierError::Config)?;
    let checker = ctx.checker()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let scheduler = Scheduler::new(
        checker.clone(),
        interval_secs,
        ctx.config.schedule.run_on_start,
    );
    let scheduler_rx = shutdown_rx.clone();
    let scheduled = tokio::spawn(async move { scheduler.run(scheduler_rx).await });

    let served = crate::server::serve(&ctx.config.server.bind, checker, shutdown_rx).await;

    // The server only returns early on error; don't wait for a signal then
    if served.is_err() {
        scheduled.abort();
    }
    if let Err(e) = scheduled.await {
        if !e.is_cancelled() {
            tracing::error!("Scheduler task failed: {}", e);
        }
    }
    served
}

pub fn show_state(ctx: &AppContext, reset: bool) -> Result<()> {
    let (checkpoint, corrupt) = match ctx.store.load() {
        Ok(checkpoint) => (checkpoint, None),
        Err(CourierError::StateCorrupt { revision, reason }) => (
            Checkpoint {
                revision,
                ..Checkpoint::default()
            },
            Some(reason),
        ),
        Err(e) => return Err(e),
    };

    if reset {
        let revision = ctx.store.save(&Checkpoint {
            revision: checkpoint.revision,
            ..Checkpoint::default()
        })?;
        println!("Checkpoint reset (revision {})", revision);
        return Ok(());
    }

    if let Some(reason) = corrupt {
        println!("Checkpoint is corrupt (revision {}): {}", checkpoint.revision, reason);
        return Ok(());
    }

    if checkpoint.revision == 0 {
        println!("No checkpoint stored yet");
        return Ok(());
    }

    println!(
        "Last check: {}\nSeen entries: {}\nRevision: {}",
        checkpoint.state.last_check_time.to_rfc3339(),
        checkpoint.state.seen_entry_ids.len(),
        checkpoint.revision
    );
    Ok(())
}
