//! pinmap-core - Core library for Pinmap
//!
//! This crate contains the shared models, marker store, geocoding client,
//! and reconciliation logic used by all Pinmap interfaces.

pub mod db;
pub mod error;
pub mod events;
pub mod geocode;
pub mod models;
pub mod reconcile;
pub mod render;
pub mod services;
pub mod state;

pub use error::{Error, Result};
pub use models::{MarkerId, MarkerRecord};
