//! Date keys and record name composition

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// A `YYYYMMDD` date string scoping the daily counter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateKey(String);

impl DateKey {
    /// Date key for the current UTC date
    #[must_use]
    pub fn today() -> Self {
        Self::from_datetime(&Utc::now())
    }

    /// Date key for an arbitrary UTC timestamp (time of day is discarded)
    #[must_use]
    pub fn from_datetime(at: &DateTime<Utc>) -> Self {
        Self(format!(
            "{:04}{:02}{:02}",
            at.year(),
            at.month(),
            at.day()
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compose the human-readable record identifier for a submission.
///
/// Counters are zero-padded to at least 3 digits and never truncated.
#[must_use]
pub fn format_record_name(date_key: &DateKey, counter: u64) -> String {
    format!("{date_key}-{counter:03}")
}
