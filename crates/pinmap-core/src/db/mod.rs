//! Database layer for pinmap

mod connection;
mod counter_repository;
mod marker_repository;
mod migrations;

pub use connection::Database;
pub use counter_repository::{CounterRepository, LibSqlCounterRepository};
pub use marker_repository::{LibSqlMarkerRepository, MarkerRepository};
