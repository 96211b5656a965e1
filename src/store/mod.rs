pub mod sqlite;

use crate::app::Result;
use crate::domain::{Checkpoint, Feed};

pub use sqlite::SqliteStore;

/// Durable home of the checkpoint.
///
/// `load` returns the default checkpoint (revision 0) when nothing has been
/// stored yet and `StateCorrupt` when a stored value does not validate.
/// `save` replaces the whole value, but only if the stored revision still
/// equals `checkpoint.revision`; otherwise it fails with `StatePersist` and
/// leaves the stored value alone. On success it returns the new revision.
pub trait CheckpointStore {
    fn load(&self) -> Result<Checkpoint>;
    fn save(&self, checkpoint: &Checkpoint) -> Result<i64>;
}

/// Ordered list of feed URLs to check.
pub trait FeedList {
    fn feed_urls(&self) -> Result<Vec<String>>;
}

impl FeedList for Vec<String> {
    fn feed_urls(&self) -> Result<Vec<String>> {
        Ok(self.clone())
    }
}

pub trait FeedStore: FeedList {
    fn add_feed(&self, feed: &Feed) -> Result<i64>;
    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>>;
    fn get_all_feeds(&self) -> Result<Vec<Feed>>;
    fn delete_feed(&self, id: i64) -> Result<()>;
}
