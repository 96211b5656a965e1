//! One run of the check-all-feeds-and-notify cycle.
//!
//! Every trigger (CLI, scheduler, HTTP) goes through [`Checker::run_check`].
//! A run loads the checkpoint, fetches and parses all feeds concurrently,
//! evaluates them one at a time in feed-list order, dispatches notifications
//! and finally writes the checkpoint back with compare-and-swap.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::app::{CourierError, Result};
use crate::config::CorruptStatePolicy;
use crate::domain::entry::sort_newest_first;
use crate::domain::{Checkpoint, DedupScope, NewEntry};
use crate::engine::NoveltyEngine;
use crate::fetcher::parallel::ParallelFetcher;
use crate::notify::{Dispatcher, SendOutcome};
use crate::parser::FeedParser;
use crate::store::{CheckpointStore, FeedList};

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    pub dedup_scope: DedupScope,
    pub on_corrupt_state: CorruptStatePolicy,
    /// Evaluate only: no notifications, checkpoint left untouched.
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct FeedFailure {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every feed was read and every notification went out.
    Ok,
    /// The checkpoint was persisted, but some feed or send failed.
    Degraded,
}

#[derive(Debug)]
pub struct RunReport {
    pub now: DateTime<Utc>,
    pub feeds_checked: usize,
    pub feed_failures: Vec<FeedFailure>,
    pub new_entries: Vec<NewEntry>,
    pub outcomes: Vec<SendOutcome>,
    /// Revision written at the end of the run; `None` for a dry run.
    pub revision: Option<i64>,
    /// The stored checkpoint was corrupt and replaced by the default.
    pub state_reset: bool,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.feed_failures.is_empty() && self.failed_sends() == 0 {
            RunStatus::Ok
        } else {
            RunStatus::Degraded
        }
    }

    pub fn failed_sends(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} feeds checked, {} failed, {} new entries, {} of {} notifications failed",
            self.feeds_checked,
            self.feed_failures.len(),
            self.new_entries.len(),
            self.failed_sends(),
            self.outcomes.len()
        )
    }
}

pub struct Checker {
    feeds: Arc<dyn FeedList + Send + Sync>,
    store: Arc<dyn CheckpointStore + Send + Sync>,
    fetcher: ParallelFetcher,
    parser: FeedParser,
    dispatcher: Dispatcher,
    options: CheckOptions,
    running: Mutex<()>,
}

impl Checker {
    pub fn new(
        feeds: Arc<dyn FeedList + Send + Sync>,
        store: Arc<dyn CheckpointStore + Send + Sync>,
        fetcher: ParallelFetcher,
        dispatcher: Dispatcher,
        options: CheckOptions,
    ) -> Self {
        Self {
            feeds,
            store,
            fetcher,
            parser: FeedParser::new(),
            dispatcher,
            options,
            running: Mutex::new(()),
        }
    }

    pub fn options(&self) -> CheckOptions {
        self.options
    }

    pub async fn run_check(&self) -> Result<RunReport> {
        self.run_check_at(Utc::now()).await
    }

    /// Run a check as if the current time were `now`.
    ///
    /// Fails fast with `RunInProgress` if another run of this checker has not
    /// finished yet.
    pub async fn run_check_at(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let _running = self
            .running
            .try_lock()
            .map_err(|_| CourierError::RunInProgress)?;

        let span = tracing::info_span!("run_check", now = %now.to_rfc3339());
        let report = self.run(now).instrument(span).await;

        match &report {
            Ok(report) => match report.status() {
                RunStatus::Ok => tracing::info!("Check complete: {}", report.summary()),
                RunStatus::Degraded => {
                    tracing::warn!("Check complete with errors: {}", report.summary())
                }
            },
            Err(e) => tracing::error!("Check failed: {}", e),
        }

        report
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let (checkpoint, state_reset) = self.load_checkpoint()?;
        let base_revision = checkpoint.revision;

        let urls = self.feeds.feed_urls()?;
        let feeds_checked = urls.len();
        tracing::info!("Checking {} feeds", feeds_checked);

        let results = self.fetcher.fetch_all(urls, &self.parser).await;

        let mut engine = NoveltyEngine::new(checkpoint.state, self.options.dedup_scope, now);
        let mut feed_failures = Vec::new();

        for (url, result) in results {
            match result {
                Ok(feed) => {
                    let outcome = engine.evaluate(&url, feed.entries);
                    tracing::debug!(
                        "{}: {} new, {} seen, {} older than checkpoint, {} without id",
                        url,
                        outcome.new,
                        outcome.seen,
                        outcome.too_old,
                        outcome.without_id
                    );
                }
                Err(e) => {
                    tracing::warn!("Error processing feed {}: {}", url, e);
                    feed_failures.push(FeedFailure {
                        url,
                        error: e.to_string(),
                    });
                }
            }
        }

        let (mut new_entries, state) = engine.finish();
        sort_newest_first(&mut new_entries);

        if self.options.dry_run {
            return Ok(RunReport {
                now,
                feeds_checked,
                feed_failures,
                new_entries,
                outcomes: Vec::new(),
                revision: None,
                state_reset,
            });
        }

        if new_entries.is_empty() {
            tracing::info!("No new entries found");
        }
        let outcomes = self.dispatcher.dispatch(&new_entries).await;

        let revision = self.store.save(&Checkpoint {
            state,
            revision: base_revision,
        })?;

        Ok(RunReport {
            now,
            feeds_checked,
            feed_failures,
            new_entries,
            outcomes,
            revision: Some(revision),
            state_reset,
        })
    }

    fn load_checkpoint(&self) -> Result<(Checkpoint, bool)> {
        match self.store.load() {
            Ok(checkpoint) => Ok((checkpoint, false)),
            Err(CourierError::StateCorrupt { revision, reason })
                if self.options.on_corrupt_state == CorruptStatePolicy::Reset =>
            {
                tracing::warn!(
                    "Stored checkpoint is unreadable ({}); continuing from an empty checkpoint",
                    reason
                );
                Ok((
                    Checkpoint {
                        revision,
                        ..Checkpoint::default()
                    },
                    true,
                ))
            }
            Err(e) => Err(e),
        }
    }
}
