//! Data models for pinmap

mod marker;
mod record_name;

pub use marker::{CarType, DayOfWeek, FillLevel, MarkerId, MarkerRecord, Submission};
pub use record_name::{format_record_name, DateKey};
