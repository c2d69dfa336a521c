//! Marker model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// A unique identifier for a marker, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerId(Uuid);

impl MarkerId {
    /// Create a new unique marker ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for MarkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MarkerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Vehicle codes accepted on submission forms.
///
/// The long-form codes distinguish depots; the icon set only distinguishes
/// vehicle families, hence `icon_family`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarType {
    BlaszakBialystok,
    BlaszakZielonka,
    FirankaBialystok,
    FirankaZielonka,
    ManStaryBialystok,
    ManNowyBialystok,
    ManZielonka,
}

impl CarType {
    /// Short icon-family name used to select marker icons
    #[must_use]
    pub const fn icon_family(self) -> &'static str {
        match self {
            Self::BlaszakBialystok | Self::BlaszakZielonka => "blaszak",
            Self::FirankaBialystok | Self::FirankaZielonka => "firanka",
            Self::ManStaryBialystok | Self::ManNowyBialystok | Self::ManZielonka => "man",
        }
    }

    /// Long-form code as submitted/stored
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BlaszakBialystok => "blaszak_bialystok",
            Self::BlaszakZielonka => "blaszak_zielonka",
            Self::FirankaBialystok => "firanka_bialystok",
            Self::FirankaZielonka => "firanka_zielonka",
            Self::ManStaryBialystok => "man_stary_bialystok",
            Self::ManNowyBialystok => "man_nowy_bialystok",
            Self::ManZielonka => "man_zielonka",
        }
    }

    /// Code with underscores replaced by spaces, for popup display
    #[must_use]
    pub fn display_name(self) -> String {
        self.code().replace('_', " ")
    }
}

impl fmt::Display for CarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CarType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blaszak_bialystok" => Ok(Self::BlaszakBialystok),
            "blaszak_zielonka" => Ok(Self::BlaszakZielonka),
            "firanka_bialystok" => Ok(Self::FirankaBialystok),
            "firanka_zielonka" => Ok(Self::FirankaZielonka),
            "man_stary_bialystok" => Ok(Self::ManStaryBialystok),
            "man_nowy_bialystok" => Ok(Self::ManNowyBialystok),
            "man_zielonka" => Ok(Self::ManZielonka),
            other => Err(Error::InvalidInput(format!("unknown car type: {other}"))),
        }
    }
}

/// Working days selectable on the legend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl DayOfWeek {
    /// All selectable days, in week order
    pub const ALL: [Self; 5] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
    ];

    /// Lowercase key as submitted/stored
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
        }
    }

    /// Localized (Polish) day name shown in popups
    #[must_use]
    pub const fn localized_name(self) -> &'static str {
        match self {
            Self::Monday => "Poniedziałek",
            Self::Tuesday => "Wtorek",
            Self::Wednesday => "Środa",
            Self::Thursday => "Czwartek",
            Self::Friday => "Piątek",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DayOfWeek {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monday" => Ok(Self::Monday),
            "tuesday" => Ok(Self::Tuesday),
            "wednesday" => Ok(Self::Wednesday),
            "thursday" => Ok(Self::Thursday),
            "friday" => Ok(Self::Friday),
            other => Err(Error::InvalidInput(format!("unknown day of week: {other}"))),
        }
    }
}

/// Cargo fill level, constrained to 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FillLevel(u8);

impl FillLevel {
    /// Create a fill level, rejecting values outside 1..=5
    pub fn new(level: u8) -> crate::Result<Self> {
        if (1..=5).contains(&level) {
            Ok(Self(level))
        } else {
            Err(Error::InvalidInput(format!(
                "fill level must be between 1 and 5, got {level}"
            )))
        }
    }

    /// Raw level value
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for FillLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FillLevel> for u8 {
    fn from(level: FillLevel) -> Self {
        level.0
    }
}

impl fmt::Display for FillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A geocoded submission: form fields plus the geocoder's output,
/// ready for reconciliation against the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    pub cargo: String,
    pub car_type: CarType,
    pub fill_level: FillLevel,
    pub city: String,
    pub day_of_week: DayOfWeek,
}

/// A persisted pin with its submitted attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecord {
    /// Store-assigned identifier
    pub id: MarkerId,
    /// Latitude from the geocoder
    pub lat: f64,
    /// Longitude from the geocoder
    pub lon: f64,
    /// Free-text pin name
    pub name: String,
    /// Free-text cargo description
    pub cargo: String,
    /// Vehicle code
    pub car_type: CarType,
    /// Cargo fill level 1-5
    pub fill_level: FillLevel,
    /// City derived from the geocoder display name
    pub city: String,
    /// Day-of-week tag used by the legend filter
    pub day_of_week: DayOfWeek,
    /// Human-readable per-day identifier, `YYYYMMDD-NNN`
    pub record_name: String,
    /// Soft-delete flag; false means hidden/invalid under soft retention
    pub active: bool,
}
