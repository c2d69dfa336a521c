//! Application controller: event dispatch, panel state, and the
//! geocode-then-submit pipeline.
//!
//! Submissions are debounced, so a burst of rapid requests results in a
//! single geocode lookup and a single store write for the last request.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::events::{AppEvent, Debouncer, Panel, SubmissionForm, DEFAULT_DEBOUNCE_WINDOW};
use crate::geocode::AddressResolver;
use crate::models::{MarkerId, Submission};
use crate::render::{MapSurface, MarkerLayer};
use crate::services::MarkerService;
use crate::Result;

/// What handling an event amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Handled,
    SubmissionSaved(MarkerId),
    /// The lookup service returned no candidates; nothing was written
    AddressNotFound,
}

/// Owns the marker service, the resolver, and the rendered layer, and turns
/// [`AppEvent`]s into store and surface mutations.
pub struct AppController<R, S> {
    service: MarkerService,
    resolver: R,
    layer: MarkerLayer,
    surface: S,
    add_pin_open: bool,
    legend_open: bool,
    debounce_window: Duration,
}

impl<R: AddressResolver, S: MapSurface> AppController<R, S> {
    /// Build a controller and render the current snapshot onto the surface.
    pub async fn new(service: MarkerService, resolver: R, surface: S) -> Result<Self> {
        let mut controller = Self {
            service,
            resolver,
            layer: MarkerLayer::new(),
            surface,
            add_pin_open: false,
            legend_open: false,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
        };
        controller.reload().await?;
        Ok(controller)
    }

    /// Override the submission debounce window (tests use a short one).
    #[must_use]
    pub const fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub const fn is_add_pin_open(&self) -> bool {
        self.add_pin_open
    }

    pub const fn is_legend_open(&self) -> bool {
        self.legend_open
    }

    pub const fn layer(&self) -> &MarkerLayer {
        &self.layer
    }

    pub const fn surface(&self) -> &S {
        &self.surface
    }

    pub const fn service(&self) -> &MarkerService {
        &self.service
    }

    /// Dispatch a single event.
    ///
    /// Submission requests are applied immediately here; debouncing happens
    /// only in [`Self::run`], which owns the timer.
    pub async fn handle_event(&mut self, event: AppEvent) -> Result<EventOutcome> {
        match event {
            AppEvent::PanelToggled(Panel::AddPin) => {
                self.add_pin_open = !self.add_pin_open;
                // The two panels never show together
                if self.add_pin_open {
                    self.legend_open = false;
                }
                Ok(EventOutcome::Handled)
            }
            AppEvent::PanelToggled(Panel::Legend) => {
                self.legend_open = !self.legend_open;
                if self.legend_open {
                    self.add_pin_open = false;
                }
                Ok(EventOutcome::Handled)
            }
            AppEvent::SubmissionRequested(form) => self.submit_form(form).await,
            AppEvent::RecordsChanged => {
                self.reload().await?;
                Ok(EventOutcome::Handled)
            }
            AppEvent::LegendDayToggled(day) => {
                self.layer.toggle_day(day, &mut self.surface);
                Ok(EventOutcome::Handled)
            }
            AppEvent::MarkerDeleted(id) => {
                self.layer.remove(id, &mut self.surface);
                self.service.delete(&id).await?;
                Ok(EventOutcome::Handled)
            }
        }
    }

    /// Event loop: debounce submissions, apply everything else directly,
    /// and re-render whenever the store revision advances.
    ///
    /// Returns the controller once the event channel closes; a pending
    /// debounced submission is flushed before returning.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<AppEvent>) -> Result<Self> {
        let (debouncer, mut due) = Debouncer::channel(self.debounce_window);
        let mut debouncer = Some(debouncer);
        let mut events_closed = false;
        let mut revisions = self.service.subscribe();

        loop {
            tokio::select! {
                event = events.recv(), if !events_closed => match event {
                    Some(AppEvent::SubmissionRequested(form)) => {
                        if let Some(debouncer) = &debouncer {
                            debouncer.call(form);
                        }
                    }
                    Some(event) => {
                        self.handle_event(event).await?;
                    }
                    None => {
                        // Dropping the handle flushes the pending call
                        events_closed = true;
                        debouncer = None;
                    }
                },
                form = due.recv() => match form {
                    Some(form) => {
                        self.submit_form(form).await?;
                    }
                    None => break,
                },
                changed = revisions.changed() => {
                    if changed.is_ok() {
                        self.reload().await?;
                    }
                }
            }
        }

        Ok(self)
    }

    /// Geocode the form's address, then hand the result to the store.
    ///
    /// An unresolvable address aborts with no store write. A second marker at
    /// the same spot within a day is an update, so repeated submissions do
    /// not pile up records.
    async fn submit_form(&mut self, form: SubmissionForm) -> Result<EventOutcome> {
        let Some(resolved) = self.resolver.resolve(&form.address).await? else {
            tracing::warn!("No geocode candidates for address: {}", form.address);
            return Ok(EventOutcome::AddressNotFound);
        };

        let submission = Submission {
            lat: resolved.lat,
            lon: resolved.lon,
            name: form.name,
            cargo: form.cargo,
            car_type: form.car_type,
            fill_level: form.fill_level,
            city: resolved.city,
            day_of_week: form.day_of_week,
        };

        let id = self.service.submit(&submission).await?;
        self.reload().await?;
        self.add_pin_open = false;
        Ok(EventOutcome::SubmissionSaved(id))
    }

    async fn reload(&mut self) -> Result<()> {
        let records = self.service.snapshot().await?;
        self.layer.sync(&records, &mut self.surface);
        Ok(())
    }
}
