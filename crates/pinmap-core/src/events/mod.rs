//! Named application events and submission debouncing.
//!
//! The UI toolkit's ad hoc callbacks are modeled as an explicit event enum
//! dispatched by the controller, so ordering and debouncing are testable
//! without any toolkit.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::{CarType, DayOfWeek, FillLevel, MarkerId};

/// Debounce window applied to submissions
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// Panels toggled from the toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    AddPin,
    Legend,
}

/// Raw form fields, before geocoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionForm {
    pub name: String,
    pub address: String,
    pub cargo: String,
    pub car_type: CarType,
    pub fill_level: FillLevel,
    pub day_of_week: DayOfWeek,
}

/// Everything the controller reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    PanelToggled(Panel),
    SubmissionRequested(SubmissionForm),
    RecordsChanged,
    LegendDayToggled(DayOfWeek),
    MarkerDeleted(MarkerId),
}

/// Collapses a burst of calls into one, keeping only the last call's
/// argument, after a quiet period.
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawn the timer task. Values passed to [`Self::call`] within `window`
    /// of each other supersede one another; the survivor is emitted on the
    /// returned receiver once the window stays quiet.
    #[must_use]
    pub fn channel(window: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (in_tx, mut in_rx) = mpsc::unbounded_channel::<T>();
        let (out_tx, out_rx) = mpsc::unbounded_channel::<T>();

        tokio::spawn(async move {
            let mut pending: Option<T> = None;
            loop {
                if let Some(value) = pending.take() {
                    tokio::select! {
                        next = in_rx.recv() => match next {
                            // A newer call resets the timer and wins
                            Some(newer) => pending = Some(newer),
                            None => {
                                let _ = out_tx.send(value);
                                break;
                            }
                        },
                        () = tokio::time::sleep(window) => {
                            let _ = out_tx.send(value);
                        }
                    }
                } else {
                    match in_rx.recv().await {
                        Some(value) => pending = Some(value),
                        None => break,
                    }
                }
            }
        });

        (Self { tx: in_tx }, out_rx)
    }

    /// Record a call; only the last call in a burst takes effect
    pub fn call(&self, value: T) {
        let _ = self.tx.send(value);
    }
}
