//! Marker repository implementation

use crate::error::{Error, Result};
use crate::models::{MarkerId, MarkerRecord, Submission};
use libsql::{params, Connection, Row};

/// Trait for marker storage operations (async)
#[allow(async_fn_in_trait)]
pub trait MarkerRepository {
    /// Insert a new marker record
    async fn create(&self, record: &MarkerRecord) -> Result<()>;

    /// Get a marker by ID, regardless of its active flag
    async fn get(&self, id: &MarkerId) -> Result<Option<MarkerRecord>>;

    /// Find the active marker at exactly the given coordinates, if any
    async fn find_active_by_coords(&self, lat: f64, lon: f64) -> Result<Option<MarkerRecord>>;

    /// Update a marker's mutable submission fields in place and re-activate it
    async fn update_submission(
        &self,
        id: &MarkerId,
        submission: &Submission,
        record_name: &str,
    ) -> Result<()>;

    /// Set the soft-delete flag
    async fn set_active(&self, id: &MarkerId, active: bool) -> Result<()>;

    /// Remove a marker row entirely
    async fn remove(&self, id: &MarkerId) -> Result<()>;

    /// List all active markers
    async fn list_active(&self) -> Result<Vec<MarkerRecord>>;

    /// List all markers, active or not
    async fn list_all(&self) -> Result<Vec<MarkerRecord>>;
}

/// libSQL implementation of `MarkerRepository`
pub struct LibSqlMarkerRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlMarkerRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    const SELECT_COLUMNS: &'static str = "id, lat, lon, name, cargo, car_type, fill_level, city, day_of_week, record_name, active";

    /// Parse a marker from a database row
    fn parse_marker(row: &Row) -> Result<MarkerRecord> {
        let id: String = row.get(0)?;
        let car_type: String = row.get(5)?;
        let fill_level: i64 = row.get(6)?;
        let day_of_week: String = row.get(8)?;

        Ok(MarkerRecord {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid marker id in row: {id}")))?,
            lat: row.get(1)?,
            lon: row.get(2)?,
            name: row.get(3)?,
            cargo: row.get(4)?,
            car_type: car_type.parse()?,
            fill_level: u8::try_from(fill_level)
                .map_err(|_| Error::Database(format!("fill level out of range: {fill_level}")))?
                .try_into()?,
            city: row.get(7)?,
            day_of_week: day_of_week.parse()?,
            record_name: row.get(9)?,
            active: row.get::<i32>(10)? != 0,
        })
    }

    async fn collect_markers(&self, sql: &str) -> Result<Vec<MarkerRecord>> {
        let mut rows = self.conn.query(sql, ()).await?;
        let mut markers = Vec::new();
        while let Some(row) = rows.next().await? {
            markers.push(Self::parse_marker(&row)?);
        }
        Ok(markers)
    }
}

impl MarkerRepository for LibSqlMarkerRepository<'_> {
    async fn create(&self, record: &MarkerRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO markers (id, lat, lon, name, cargo, car_type, fill_level, city, day_of_week, record_name, active)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    record.id.as_str(),
                    record.lat,
                    record.lon,
                    record.name.as_str(),
                    record.cargo.as_str(),
                    record.car_type.code(),
                    i64::from(record.fill_level.value()),
                    record.city.as_str(),
                    record.day_of_week.key(),
                    record.record_name.as_str(),
                    i64::from(record.active)
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &MarkerId) -> Result<Option<MarkerRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {} FROM markers WHERE id = ?",
                    Self::SELECT_COLUMNS
                ),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_marker(&row)?)),
            None => Ok(None),
        }
    }

    // The store indexes a single field; latitude equality is the coarse
    // pre-filter, longitude and the active flag are narrowed in code.
    #[allow(clippy::float_cmp)] // exact equality on geocoder-returned values
    async fn find_active_by_coords(&self, lat: f64, lon: f64) -> Result<Option<MarkerRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {} FROM markers WHERE lat = ?",
                    Self::SELECT_COLUMNS
                ),
                params![lat],
            )
            .await?;

        while let Some(row) = rows.next().await? {
            let marker = Self::parse_marker(&row)?;
            if marker.lon == lon && marker.active {
                return Ok(Some(marker));
            }
        }

        Ok(None)
    }

    async fn update_submission(
        &self,
        id: &MarkerId,
        submission: &Submission,
        record_name: &str,
    ) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE markers
                 SET name = ?, cargo = ?, car_type = ?, fill_level = ?, city = ?, day_of_week = ?, record_name = ?, active = 1
                 WHERE id = ?",
                params![
                    submission.name.as_str(),
                    submission.cargo.as_str(),
                    submission.car_type.code(),
                    i64::from(submission.fill_level.value()),
                    submission.city.as_str(),
                    submission.day_of_week.key(),
                    record_name,
                    id.as_str()
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn set_active(&self, id: &MarkerId, active: bool) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE markers SET active = ? WHERE id = ?",
                params![i64::from(active), id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn remove(&self, id: &MarkerId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM markers WHERE id = ?", [id.as_str()])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<MarkerRecord>> {
        self.collect_markers(&format!(
            "SELECT {} FROM markers WHERE active = 1 ORDER BY id",
            Self::SELECT_COLUMNS
        ))
        .await
    }

    async fn list_all(&self) -> Result<Vec<MarkerRecord>> {
        self.collect_markers(&format!(
            "SELECT {} FROM markers ORDER BY id",
            Self::SELECT_COLUMNS
        ))
        .await
    }
}
