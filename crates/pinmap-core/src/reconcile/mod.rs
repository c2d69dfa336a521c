//! Marker reconciliation and the day-counter protocol.
//!
//! A geocoded submission either updates the existing active marker at the
//! same coordinates or creates a new one, and always consumes one value from
//! the daily counter that scopes human-readable record names.

use chrono::{DateTime, Utc};
use libsql::Connection;

use crate::db::{
    CounterRepository, LibSqlCounterRepository, LibSqlMarkerRepository, MarkerRepository,
};
use crate::error::Result;
use crate::models::{format_record_name, DateKey, MarkerId, MarkerRecord, Submission};

/// What deletion does, and which records a snapshot contains.
///
/// `Soft` keeps history behind an `active` flag; `Hard` removes rows and
/// never updates in place (every submission creates a fresh record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    #[default]
    Soft,
    Hard,
}

/// How the daily counter is advanced.
///
/// `Baseline` reproduces the source protocol: a read, an in-memory
/// increment, and a later write, with suspension points in between. Two
/// racing submissions can read the same value and produce duplicate record
/// names, and can both miss an in-flight record for the same coordinates.
/// `Transactional` is the corrected alternative: one atomic upsert for the
/// counter and a transaction around the find-or-create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterMode {
    #[default]
    Baseline,
    Transactional,
}

/// Reconciler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcilerConfig {
    pub retention: RetentionPolicy,
    pub counter_mode: CounterMode,
}

/// Applies submissions and deletions to the marker store
pub struct Reconciler<'a> {
    conn: &'a Connection,
    config: ReconcilerConfig,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler over the given connection
    pub const fn new(conn: &'a Connection, config: ReconcilerConfig) -> Self {
        Self { conn, config }
    }

    pub const fn config(&self) -> ReconcilerConfig {
        self.config
    }

    /// Persist a geocoded submission, dated with the current UTC date.
    ///
    /// Returns the identifier of the updated or created record. The caller
    /// is expected to reload the snapshot afterwards.
    pub async fn submit(&self, submission: &Submission) -> Result<MarkerId> {
        self.submit_at(submission, &Utc::now()).await
    }

    /// Persist a geocoded submission dated with an explicit timestamp
    pub async fn submit_at(
        &self,
        submission: &Submission,
        now: &DateTime<Utc>,
    ) -> Result<MarkerId> {
        let date_key = DateKey::from_datetime(now);

        match self.config.counter_mode {
            CounterMode::Baseline => self.submit_baseline(submission, &date_key).await,
            CounterMode::Transactional => self.submit_transactional(submission, &date_key).await,
        }
    }

    /// Source-compatible protocol: find existing, read counter, write marker,
    /// write counter, each as an independent store operation.
    async fn submit_baseline(
        &self,
        submission: &Submission,
        date_key: &DateKey,
    ) -> Result<MarkerId> {
        let markers = LibSqlMarkerRepository::new(self.conn);
        let counters = LibSqlCounterRepository::new(self.conn);

        let existing = self.find_existing(&markers, submission).await?;

        let counter = counters.get(date_key).await?.unwrap_or(0) + 1;
        let record_name = format_record_name(date_key, counter);

        let id = self
            .write_marker(&markers, submission, existing, &record_name)
            .await?;

        counters.set(date_key, counter).await?;
        Ok(id)
    }

    /// Corrected protocol: one transaction around the uniqueness check and
    /// the marker write, with an atomic counter upsert.
    async fn submit_transactional(
        &self,
        submission: &Submission,
        date_key: &DateKey,
    ) -> Result<MarkerId> {
        let markers = LibSqlMarkerRepository::new(self.conn);
        let counters = LibSqlCounterRepository::new(self.conn);

        self.conn.execute("BEGIN IMMEDIATE", ()).await?;

        let outcome = async {
            let existing = self.find_existing(&markers, submission).await?;
            let counter = counters.increment(date_key).await?;
            let record_name = format_record_name(date_key, counter);
            self.write_marker(&markers, submission, existing, &record_name)
                .await
        }
        .await;

        match outcome {
            Ok(id) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(id)
            }
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }

    async fn find_existing(
        &self,
        markers: &LibSqlMarkerRepository<'_>,
        submission: &Submission,
    ) -> Result<Option<MarkerId>> {
        // Hard retention never updates in place; each submission is a new record
        if self.config.retention == RetentionPolicy::Hard {
            return Ok(None);
        }

        Ok(markers
            .find_active_by_coords(submission.lat, submission.lon)
            .await?
            .map(|record| record.id))
    }

    async fn write_marker(
        &self,
        markers: &LibSqlMarkerRepository<'_>,
        submission: &Submission,
        existing: Option<MarkerId>,
        record_name: &str,
    ) -> Result<MarkerId> {
        if let Some(id) = existing {
            markers
                .update_submission(&id, submission, record_name)
                .await?;
            tracing::debug!("Marker updated: {id}");
            return Ok(id);
        }

        let record = MarkerRecord {
            id: MarkerId::new(),
            lat: submission.lat,
            lon: submission.lon,
            name: submission.name.clone(),
            cargo: submission.cargo.clone(),
            car_type: submission.car_type,
            fill_level: submission.fill_level,
            city: submission.city.clone(),
            day_of_week: submission.day_of_week,
            record_name: record_name.to_string(),
            active: true,
        };
        markers.create(&record).await?;
        tracing::debug!("New marker added: {}", record.id);
        Ok(record.id)
    }

    /// Delete a marker according to the retention policy
    pub async fn delete(&self, id: &MarkerId) -> Result<()> {
        let markers = LibSqlMarkerRepository::new(self.conn);
        match self.config.retention {
            RetentionPolicy::Soft => {
                markers.set_active(id, false).await?;
                tracing::debug!("Marker marked inactive: {id}");
            }
            RetentionPolicy::Hard => {
                markers.remove(id).await?;
                tracing::debug!("Marker removed: {id}");
            }
        }
        Ok(())
    }

    /// Load the renderable snapshot: active records under soft retention,
    /// the full set under hard retention
    pub async fn snapshot(&self) -> Result<Vec<MarkerRecord>> {
        let markers = LibSqlMarkerRepository::new(self.conn);
        match self.config.retention {
            RetentionPolicy::Soft => markers.list_active().await,
            RetentionPolicy::Hard => markers.list_all().await,
        }
    }

    /// Initialize today's counter key to zero if absent
    pub async fn ensure_today_counter(&self) -> Result<()> {
        let counters = LibSqlCounterRepository::new(self.conn);
        counters.ensure(&DateKey::today()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{CarType, DayOfWeek, FillLevel};
    use chrono::TimeZone;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
    }

    fn submission(lat: f64, lon: f64, name: &str) -> Submission {
        Submission {
            lat,
            lon,
            name: name.to_string(),
            cargo: "Pallets".to_string(),
            car_type: CarType::FirankaBialystok,
            fill_level: FillLevel::new(2).unwrap(),
            city: "Bialystok".to_string(),
            day_of_week: DayOfWeek::Wednesday,
        }
    }

    fn soft(conn: &libsql::Connection) -> Reconciler<'_> {
        Reconciler::new(conn, ReconcilerConfig::default())
    }

    fn hard(conn: &libsql::Connection) -> Reconciler<'_> {
        Reconciler::new(
            conn,
            ReconcilerConfig {
                retention: RetentionPolicy::Hard,
                ..ReconcilerConfig::default()
            },
        )
    }

    fn transactional(conn: &libsql::Connection) -> Reconciler<'_> {
        Reconciler::new(
            conn,
            ReconcilerConfig {
                counter_mode: CounterMode::Transactional,
                ..ReconcilerConfig::default()
            },
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn distinct_coordinates_create_distinct_records_with_consecutive_names() {
        let db = setup().await;
        let reconciler = soft(db.connection());

        let first = reconciler
            .submit_at(&submission(52.0, 19.0, "A"), &at())
            .await
            .unwrap();
        let second = reconciler
            .submit_at(&submission(53.0, 20.0, "B"), &at())
            .await
            .unwrap();

        assert_ne!(first, second);

        let mut names: Vec<String> = reconciler
            .snapshot()
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.record_name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["20240315-001", "20240315-002"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn same_coordinates_update_in_place_under_soft_retention() {
        let db = setup().await;
        let reconciler = soft(db.connection());

        let first = reconciler
            .submit_at(&submission(52.0, 19.0, "Original"), &at())
            .await
            .unwrap();
        let second = reconciler
            .submit_at(&submission(52.0, 19.0, "Replacement"), &at())
            .await
            .unwrap();

        // Same identifier, one active record, fresh record name
        assert_eq!(first, second);
        let records = reconciler.snapshot().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Replacement");
        assert_eq!(records[0].record_name, "20240315-002");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn counter_advances_even_when_updating() {
        let db = setup().await;
        let reconciler = soft(db.connection());
        let counters = LibSqlCounterRepository::new(db.connection());

        reconciler
            .submit_at(&submission(52.0, 19.0, "A"), &at())
            .await
            .unwrap();
        reconciler
            .submit_at(&submission(52.0, 19.0, "B"), &at())
            .await
            .unwrap();

        let key = DateKey::from_datetime(&at());
        assert_eq!(counters.get(&key).await.unwrap(), Some(2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn nearly_equal_coordinates_do_not_match() {
        let db = setup().await;
        let reconciler = soft(db.connection());

        reconciler
            .submit_at(&submission(52.229_700, 21.012_200, "A"), &at())
            .await
            .unwrap();
        reconciler
            .submit_at(&submission(52.229_700_1, 21.012_200, "B"), &at())
            .await
            .unwrap();

        // Equality is exact on the geocoder's floats
        assert_eq!(reconciler.snapshot().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hard_retention_always_creates() {
        let db = setup().await;
        let reconciler = hard(db.connection());

        let first = reconciler
            .submit_at(&submission(52.0, 19.0, "A"), &at())
            .await
            .unwrap();
        let second = reconciler
            .submit_at(&submission(52.0, 19.0, "B"), &at())
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(reconciler.snapshot().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn soft_delete_hides_from_snapshot_but_keeps_history() {
        let db = setup().await;
        let reconciler = soft(db.connection());
        let markers = LibSqlMarkerRepository::new(db.connection());

        let id = reconciler
            .submit_at(&submission(52.0, 19.0, "A"), &at())
            .await
            .unwrap();
        reconciler.delete(&id).await.unwrap();

        assert!(reconciler.snapshot().await.unwrap().is_empty());
        let kept = markers.get(&id).await.unwrap().unwrap();
        assert!(!kept.active);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hard_delete_removes_row() {
        let db = setup().await;
        let reconciler = hard(db.connection());
        let markers = LibSqlMarkerRepository::new(db.connection());

        let id = reconciler
            .submit_at(&submission(52.0, 19.0, "A"), &at())
            .await
            .unwrap();
        reconciler.delete(&id).await.unwrap();

        assert!(reconciler.snapshot().await.unwrap().is_empty());
        assert!(markers.get(&id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resubmitting_after_soft_delete_revives_the_record() {
        let db = setup().await;
        let reconciler = soft(db.connection());

        let id = reconciler
            .submit_at(&submission(52.0, 19.0, "A"), &at())
            .await
            .unwrap();
        reconciler.delete(&id).await.unwrap();

        // The inactive record no longer matches the coordinate lookup, so
        // this creates a second record at the same coordinates
        let revived = reconciler
            .submit_at(&submission(52.0, 19.0, "B"), &at())
            .await
            .unwrap();
        assert_ne!(id, revived);

        let records = reconciler.snapshot().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].active);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transactional_mode_matches_baseline_outcomes() {
        let db = setup().await;
        let reconciler = transactional(db.connection());
        let counters = LibSqlCounterRepository::new(db.connection());

        let first = reconciler
            .submit_at(&submission(52.0, 19.0, "A"), &at())
            .await
            .unwrap();
        let second = reconciler
            .submit_at(&submission(52.0, 19.0, "B"), &at())
            .await
            .unwrap();

        assert_eq!(first, second);
        let records = reconciler.snapshot().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_name, "20240315-002");

        let key = DateKey::from_datetime(&at());
        assert_eq!(counters.get(&key).await.unwrap(), Some(2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn counters_reset_on_a_new_day() {
        let db = setup().await;
        let reconciler = soft(db.connection());

        reconciler
            .submit_at(&submission(52.0, 19.0, "A"), &at())
            .await
            .unwrap();

        let next_day = Utc.with_ymd_and_hms(2024, 3, 16, 0, 1, 0).unwrap();
        reconciler
            .submit_at(&submission(53.0, 20.0, "B"), &next_day)
            .await
            .unwrap();

        let names: Vec<String> = reconciler
            .snapshot()
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.record_name)
            .collect();
        assert!(names.contains(&"20240315-001".to_string()));
        assert!(names.contains(&"20240316-001".to_string()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ensure_today_counter_is_idempotent() {
        let db = setup().await;
        let reconciler = soft(db.connection());

        reconciler.ensure_today_counter().await.unwrap();
        reconciler.ensure_today_counter().await.unwrap();

        let counters = LibSqlCounterRepository::new(db.connection());
        assert_eq!(counters.get(&DateKey::today()).await.unwrap(), Some(0));
    }
}
