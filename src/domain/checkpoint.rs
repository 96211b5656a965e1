use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::Result;

/// Key under which the checkpoint is stored.
pub const CHECKPOINT_KEY: &str = "last_check_data";

/// How far processing has progressed: when the last run finished and which
/// entries have already been notified.
///
/// Serialized as `{"lastCheckTime": <epoch ms>, "seenEntryIds": [..]}`.
/// Deserialization is strict: both fields are required and nothing else is
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckpointState {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_check_time: DateTime<Utc>,
    pub seen_entry_ids: BTreeSet<String>,
}

impl Default for CheckpointState {
    fn default() -> Self {
        Self {
            last_check_time: DateTime::UNIX_EPOCH,
            seen_entry_ids: BTreeSet::new(),
        }
    }
}

impl CheckpointState {
    /// Parse and validate a stored value.
    pub fn from_json(raw: &str) -> std::result::Result<Self, String> {
        let state: Self = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        state.validate()?;
        Ok(state)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.last_check_time < DateTime::<Utc>::UNIX_EPOCH {
            return Err(format!(
                "lastCheckTime {} is before the epoch",
                self.last_check_time.timestamp_millis()
            ));
        }
        if self.seen_entry_ids.iter().any(|id| id.is_empty()) {
            return Err("seenEntryIds contains an empty identifier".into());
        }
        Ok(())
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.seen_entry_ids.contains(id)
    }

    /// Record `id` as notified. Returns false if it was already present.
    pub fn mark_seen(&mut self, id: impl Into<String>) -> bool {
        self.seen_entry_ids.insert(id.into())
    }

    /// Move the checkpoint forward to `now`. Never moves it backwards, so a
    /// wall clock that stepped back cannot re-open an already covered window.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        if now > self.last_check_time {
            self.last_check_time = now;
        }
    }
}

/// A checkpoint as held by the store, tagged with the revision it was read at.
///
/// Revision 0 means nothing has been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub state: CheckpointState,
    pub revision: i64,
}
