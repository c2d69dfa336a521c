//! Daily counter repository implementation

use crate::error::{Error, Result};
use crate::models::DateKey;
use libsql::{params, Connection};

/// Trait for daily counter storage operations (async)
#[allow(async_fn_in_trait)]
pub trait CounterRepository {
    /// Read the counter for a date key; `None` if the key is absent
    async fn get(&self, key: &DateKey) -> Result<Option<u64>>;

    /// Overwrite the counter for a date key
    async fn set(&self, key: &DateKey, value: u64) -> Result<()>;

    /// Initialize the counter to zero if the key is absent
    async fn ensure(&self, key: &DateKey) -> Result<()>;

    /// Atomically increment the counter and return the new value.
    ///
    /// Treats an absent key as zero. This is the transactional alternative
    /// to the separate `get`/`set` pair.
    async fn increment(&self, key: &DateKey) -> Result<u64>;
}

/// libSQL implementation of `CounterRepository`
pub struct LibSqlCounterRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCounterRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn to_counter(raw: i64) -> Result<u64> {
    u64::try_from(raw).map_err(|_| Error::Database(format!("negative counter value: {raw}")))
}

impl CounterRepository for LibSqlCounterRepository<'_> {
    async fn get(&self, key: &DateKey) -> Result<Option<u64>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM counters WHERE date_key = ?", [key.as_str()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(to_counter(row.get::<i64>(0)?)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &DateKey, value: u64) -> Result<()> {
        let value = i64::try_from(value)
            .map_err(|_| Error::InvalidInput(format!("counter value too large: {value}")))?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO counters (date_key, value) VALUES (?, ?)",
                params![key.as_str(), value],
            )
            .await?;
        Ok(())
    }

    async fn ensure(&self, key: &DateKey) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO counters (date_key, value) VALUES (?, 0)",
                [key.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn increment(&self, key: &DateKey) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "INSERT INTO counters (date_key, value) VALUES (?, 1)
                 ON CONFLICT(date_key) DO UPDATE SET value = value + 1
                 RETURNING value",
                [key.as_str()],
            )
            .await?;

        let row = rows
            .next()
            .await?
            .ok_or_else(|| Error::Database("counter upsert returned no row".to_string()))?;
        to_counter(row.get::<i64>(0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{TimeZone, Utc};

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn key() -> DateKey {
        DateKey::from_datetime(&Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_absent_key_is_none() {
        let db = setup().await;
        let repo = LibSqlCounterRepository::new(db.connection());
        assert_eq!(repo.get(&key()).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_then_get() {
        let db = setup().await;
        let repo = LibSqlCounterRepository::new(db.connection());

        repo.set(&key(), 7).await.unwrap();
        assert_eq!(repo.get(&key()).await.unwrap(), Some(7));

        repo.set(&key(), 8).await.unwrap();
        assert_eq!(repo.get(&key()).await.unwrap(), Some(8));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ensure_initializes_once() {
        let db = setup().await;
        let repo = LibSqlCounterRepository::new(db.connection());

        repo.ensure(&key()).await.unwrap();
        assert_eq!(repo.get(&key()).await.unwrap(), Some(0));

        // Must not clobber an existing value
        repo.set(&key(), 5).await.unwrap();
        repo.ensure(&key()).await.unwrap();
        assert_eq!(repo.get(&key()).await.unwrap(), Some(5));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_increment_from_absent_and_existing() {
        let db = setup().await;
        let repo = LibSqlCounterRepository::new(db.connection());

        assert_eq!(repo.increment(&key()).await.unwrap(), 1);
        assert_eq!(repo.increment(&key()).await.unwrap(), 2);
        assert_eq!(repo.get(&key()).await.unwrap(), Some(2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_counters_are_scoped_per_day() {
        let db = setup().await;
        let repo = LibSqlCounterRepository::new(db.connection());

        let other = DateKey::from_datetime(&Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap());
        repo.increment(&key()).await.unwrap();
        repo.increment(&key()).await.unwrap();

        // A new day starts from a fresh key
        assert_eq!(repo.increment(&other).await.unwrap(), 1);
        assert_eq!(repo.get(&key()).await.unwrap(), Some(2));
    }
}
