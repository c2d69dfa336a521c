//! Shared services used across clients

mod markers;

pub use markers::MarkerService;
