//! Shared marker store service wrapper used across clients.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::db::{Database, LibSqlMarkerRepository, MarkerRepository};
use crate::models::{MarkerId, MarkerRecord, Submission};
use crate::reconcile::{Reconciler, ReconcilerConfig};
use crate::Result;

/// Thread-safe service for marker store operations.
///
/// Clones share one database handle and one revision channel, so every clone
/// observes every mutation.
#[derive(Clone)]
pub struct MarkerService {
    db: Arc<Mutex<Database>>,
    config: ReconcilerConfig,
    revision: Arc<watch::Sender<u64>>,
}

impl MarkerService {
    /// Open a marker service at the given filesystem path.
    pub async fn open_path(
        db_path: impl Into<PathBuf>,
        config: ReconcilerConfig,
    ) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        Self::from_database(db, config).await
    }

    /// Open an in-memory marker service (primarily for tests).
    pub async fn open_in_memory(config: ReconcilerConfig) -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Self::from_database(db, config).await
    }

    async fn from_database(db: Database, config: ReconcilerConfig) -> Result<Self> {
        let service = Self {
            db: Arc::new(Mutex::new(db)),
            config,
            revision: Arc::new(watch::channel(0).0),
        };

        // Seed today's counter key on startup
        service.ensure_today_counter().await?;
        Ok(service)
    }

    /// Returns the reconciler configuration this service was opened with.
    pub const fn config(&self) -> ReconcilerConfig {
        self.config
    }

    /// Subscribe to store revisions. The receiver is marked changed after
    /// every successful mutation; callers reload the snapshot in response.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Persist a geocoded submission and return the record identifier.
    pub async fn submit(&self, submission: &Submission) -> Result<MarkerId> {
        let id = {
            let db = self.db.lock().await;
            let reconciler = Reconciler::new(db.connection(), self.config);
            reconciler.submit(submission).await?
        };
        self.notify();
        Ok(id)
    }

    /// Persist a geocoded submission dated with an explicit timestamp.
    pub async fn submit_at(
        &self,
        submission: &Submission,
        now: &chrono::DateTime<chrono::Utc>,
    ) -> Result<MarkerId> {
        let id = {
            let db = self.db.lock().await;
            let reconciler = Reconciler::new(db.connection(), self.config);
            reconciler.submit_at(submission, now).await?
        };
        self.notify();
        Ok(id)
    }

    /// Delete a marker according to the retention policy.
    pub async fn delete(&self, id: &MarkerId) -> Result<()> {
        {
            let db = self.db.lock().await;
            let reconciler = Reconciler::new(db.connection(), self.config);
            reconciler.delete(id).await?;
        }
        self.notify();
        Ok(())
    }

    /// Load the renderable snapshot for the current retention policy.
    pub async fn snapshot(&self) -> Result<Vec<MarkerRecord>> {
        let db = self.db.lock().await;
        let reconciler = Reconciler::new(db.connection(), self.config);
        reconciler.snapshot().await
    }

    /// Fetch a single record by id.
    pub async fn get(&self, id: &MarkerId) -> Result<Option<MarkerRecord>> {
        let db = self.db.lock().await;
        let repo = LibSqlMarkerRepository::new(db.connection());
        repo.get(id).await
    }

    /// List every record including soft-deleted ones.
    pub async fn history(&self) -> Result<Vec<MarkerRecord>> {
        let db = self.db.lock().await;
        let repo = LibSqlMarkerRepository::new(db.connection());
        repo.list_all().await
    }

    /// Initialize today's counter key to zero if absent.
    pub async fn ensure_today_counter(&self) -> Result<()> {
        let db = self.db.lock().await;
        let reconciler = Reconciler::new(db.connection(), self.config);
        reconciler.ensure_today_counter().await
    }
}
