//! Novelty test and checkpoint bookkeeping for one run.
//!
//! An entry is new when its id has never been notified and it was published
//! after the last checkpoint. Entries without a stated publish time count as
//! published at the run's `now`. Ids are recorded as soon as an entry is
//! accepted, so a duplicate later in the same run is already seen.

use chrono::{DateTime, Utc};

use crate::domain::{CheckpointState, DedupScope, NewEntry, RawEntry};

/// Per-feed evaluation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedEvaluation {
    pub new: usize,
    pub seen: usize,
    pub too_old: usize,
    pub without_id: usize,
}

/// Accumulates the result of one run across all feeds.
///
/// Owns the checkpoint state for the duration of the run; feeds are fed in
/// one at a time, in feed-list order.
pub struct NoveltyEngine {
    state: CheckpointState,
    baseline: DateTime<Utc>,
    scope: DedupScope,
    now: DateTime<Utc>,
    new_entries: Vec<NewEntry>,
}

impl NoveltyEngine {
    pub fn new(state: CheckpointState, scope: DedupScope, now: DateTime<Utc>) -> Self {
        Self {
            baseline: state.last_check_time,
            state,
            scope,
            now,
            new_entries: Vec::new(),
        }
    }

    pub fn evaluate(&mut self, feed_url: &str, entries: Vec<RawEntry>) -> FeedEvaluation {
        let mut outcome = FeedEvaluation::default();

        for entry in entries {
            if !entry.has_identity() {
                tracing::debug!("Skipping entry without guid, link or title in {}", feed_url);
                outcome.without_id += 1;
                continue;
            }

            let key = self.scope.key(feed_url, &entry.candidate_id);
            if self.state.is_seen(&key) {
                outcome.seen += 1;
                continue;
            }

            let published_at = entry.published_at.unwrap_or(self.now);
            if published_at <= self.baseline {
                outcome.too_old += 1;
                continue;
            }

            self.state.mark_seen(key.clone());
            self.new_entries
                .push(NewEntry::from_raw(entry, key, feed_url, published_at));
            outcome.new += 1;
        }

        outcome
    }

    pub fn new_entries(&self) -> &[NewEntry] {
        &self.new_entries
    }

    /// Close the run: advance the checkpoint to `now` and hand back the new
    /// entries in discovery order together with the updated state.
    pub fn finish(mut self) -> (Vec<NewEntry>, CheckpointState) {
        self.state.advance(self.now);
        (self.new_entries, self.state)
    }
}

/// Evaluate a single batch of entries against `state`.
pub fn evaluate(
    feed_url: &str,
    entries: Vec<RawEntry>,
    state: CheckpointState,
    now: DateTime<Utc>,
) -> (Vec<NewEntry>, CheckpointState) {
    let mut engine = NoveltyEngine::new(state, DedupScope::Global, now);
    engine.evaluate(feed_url, entries);
    engine.finish()
}
