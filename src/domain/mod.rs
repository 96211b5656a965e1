pub mod checkpoint;
pub mod entry;
pub mod feed;

pub use checkpoint::{Checkpoint, CheckpointState, CHECKPOINT_KEY};
pub use entry::{DedupScope, NewEntry, RawEntry};
pub use feed::Feed;
