//! Marker set rendering and day-of-week filtering.
//!
//! The actual tile map is an external collaborator behind the `MapSurface`
//! trait; this module only owns the mapping from record identifiers to
//! rendered marker state and the currently enabled legend days.

use std::collections::{HashMap, HashSet};

use crate::models::{CarType, DayOfWeek, FillLevel, MarkerId, MarkerRecord};

/// Rendering surface exposed by the embedded map widget
pub trait MapSurface {
    /// Add a visual marker for a record
    fn add_marker(&mut self, id: MarkerId, lat: f64, lon: f64, icon: &str, popup: &str);

    /// Remove a marker's visual entirely
    fn remove_marker(&mut self, id: MarkerId);

    /// Hide or show a marker without discarding it
    fn set_visible(&mut self, id: MarkerId, visible: bool);
}

/// Icon selector, derived deterministically from the record's attributes
#[must_use]
pub fn icon_path(car_type: CarType, fill_level: FillLevel, day: DayOfWeek) -> String {
    format!(
        "static/{}_{}_{}.png",
        car_type.icon_family(),
        fill_level.value(),
        day.key()
    )
}

/// Popup body for a rendered marker
#[must_use]
pub fn popup_text(record: &MarkerRecord) -> String {
    format!(
        "{}\nNumer rekordu: {}\nMiasto: {}\nAuto: {}\nDzień: {}\nTowar: {}\nZapełnienie: {}/5",
        record.name,
        record.record_name,
        record.city,
        record.car_type.display_name(),
        record.day_of_week.localized_name(),
        record.cargo,
        record.fill_level
    )
}

/// In-memory view state: one entry per rendered marker plus the enabled days
#[derive(Debug)]
pub struct MarkerLayer {
    rendered: HashMap<MarkerId, DayOfWeek>,
    enabled_days: HashSet<DayOfWeek>,
}

impl MarkerLayer {
    /// Create a layer with every legend day enabled
    #[must_use]
    pub fn new() -> Self {
        Self {
            rendered: HashMap::new(),
            enabled_days: DayOfWeek::ALL.into_iter().collect(),
        }
    }

    /// Whether a legend day is currently enabled
    #[must_use]
    pub fn is_day_enabled(&self, day: DayOfWeek) -> bool {
        self.enabled_days.contains(&day)
    }

    /// Identifiers of currently rendered markers
    #[must_use]
    pub fn rendered_ids(&self) -> Vec<MarkerId> {
        self.rendered.keys().copied().collect()
    }

    /// Rebuild the layer from a fresh snapshot: drop every rendered marker,
    /// add one per record, then re-apply the day filter
    pub fn sync(&mut self, records: &[MarkerRecord], surface: &mut impl MapSurface) {
        for id in self.rendered.keys() {
            surface.remove_marker(*id);
        }
        self.rendered.clear();

        for record in records {
            let icon = icon_path(record.car_type, record.fill_level, record.day_of_week);
            let popup = popup_text(record);
            surface.add_marker(record.id, record.lat, record.lon, &icon, &popup);
            self.rendered.insert(record.id, record.day_of_week);
        }

        self.apply_filter(surface);
    }

    /// Flip a legend day and update marker visibility; returns the new state
    pub fn toggle_day(&mut self, day: DayOfWeek, surface: &mut impl MapSurface) -> bool {
        let enabled = if self.enabled_days.remove(&day) {
            false
        } else {
            self.enabled_days.insert(day);
            true
        };
        self.apply_filter(surface);
        enabled
    }

    /// Hide markers whose day is disabled, show the rest
    pub fn apply_filter(&self, surface: &mut impl MapSurface) {
        for (id, day) in &self.rendered {
            surface.set_visible(*id, self.enabled_days.contains(day));
        }
    }

    /// Drop a single marker's rendering state (user-initiated deletion)
    pub fn remove(&mut self, id: MarkerId, surface: &mut impl MapSurface) {
        if self.rendered.remove(&id).is_some() {
            surface.remove_marker(id);
        }
    }
}

impl Default for MarkerLayer {
    fn default() -> Self {
        Self::new()
    }
}
