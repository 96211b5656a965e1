use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{CourierError, Result};
use crate::domain::{Checkpoint, CheckpointState, Feed, CHECKPOINT_KEY};
use crate::store::{CheckpointStore, FeedList, FeedStore};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;

        migrations
            .to_latest(&mut conn)
            .map_err(|e| CourierError::Other(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            CourierError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn row_to_feed(row: &rusqlite::Row<'_>) -> rusqlite::Result<Feed> {
        Ok(Feed {
            id: row.get(0)?,
            url: row.get(1)?,
            title: row.get(2)?,
            created_at: row
                .get::<_, String>(3)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    /// Store a raw checkpoint value, bypassing validation.
    #[cfg(test)]
    pub(crate) fn put_raw_checkpoint(&self, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv (key, value, revision, updated_at) VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, revision = revision + 1, updated_at = ?3",
            params![CHECKPOINT_KEY, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn write_checkpoint(&self, checkpoint: &Checkpoint, value: &str) -> Result<i64> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let written = if checkpoint.revision == 0 {
            conn.execute(
                "INSERT OR IGNORE INTO kv (key, value, revision, updated_at) VALUES (?1, ?2, 1, ?3)",
                params![CHECKPOINT_KEY, value, now],
            )?
        } else {
            conn.execute(
                "UPDATE kv SET value = ?1, revision = revision + 1, updated_at = ?2
                 WHERE key = ?3 AND revision = ?4",
                params![value, now, CHECKPOINT_KEY, checkpoint.revision],
            )?
        };

        if written == 0 {
            return Err(CourierError::StatePersist(format!(
                "checkpoint changed since revision {} was loaded",
                checkpoint.revision
            )));
        }

        Ok(checkpoint.revision + 1)
    }
}

impl CheckpointStore for SqliteStore {
    fn load(&self) -> Result<Checkpoint> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT value, revision FROM kv WHERE key = ?1",
                params![CHECKPOINT_KEY],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(Checkpoint::default()),
            Some((value, revision)) => match CheckpointState::from_json(&value) {
                Ok(state) => Ok(Checkpoint { state, revision }),
                Err(reason) => Err(CourierError::StateCorrupt { revision, reason }),
            },
        }
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<i64> {
        let value = checkpoint
            .state
            .to_json()
            .map_err(|e| CourierError::StatePersist(e.to_string()))?;

        self.write_checkpoint(checkpoint, &value).map_err(|e| match e {
            CourierError::StatePersist(_) => e,
            other => CourierError::StatePersist(other.to_string()),
        })
    }
}

impl FeedList for SqliteStore {
    fn feed_urls(&self) -> Result<Vec<String>> {
        Ok(self.get_all_feeds()?.into_iter().map(|f| f.url).collect())
    }
}

impl FeedStore for SqliteStore {
    fn add_feed(&self, feed: &Feed) -> Result<i64> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO feeds (url, title, created_at) VALUES (?1, ?2, ?3)",
            params![feed.url, feed.title, feed.created_at.to_rfc3339()],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                "SELECT id, url, title, created_at FROM feeds WHERE url = ?1",
                params![url],
                Self::row_to_feed,
            )
            .optional()?;

        Ok(result)
    }

    fn get_all_feeds(&self) -> Result<Vec<Feed>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT id, url, title, created_at FROM feeds ORDER BY id")?;

        let feeds = stmt
            .query_map([], Self::row_to_feed)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(feeds)
    }

    fn delete_feed(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM feeds WHERE id = ?1", params![id])?;
        Ok(())
    }
}
