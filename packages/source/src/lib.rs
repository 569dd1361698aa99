#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data loading for hotspot detection.
//!
//! Each CSV export is described by a [`SourceDefinition`] (embedded TOML,
//! see [`registry`]). [`load_csv`] turns an export into an
//! [`EventSet`](basel_hotspots_event_models::EventSet), and [`EventFilter`]
//! narrows it down by year, time of day, severity or category.

pub mod filter;
pub mod loader;
pub mod parsing;
pub mod registry;
pub mod source_def;

pub use filter::{EventFilter, ObservationWindow, TimeOfDay};
pub use loader::{LoadReport, load_csv, load_path};
pub use registry::{all_sources, find_source};
pub use source_def::SourceDefinition;

/// Errors that can occur while loading or filtering source data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The CSV header lacks a column the definition maps.
    #[error("[{source_id}] Missing column `{column}`")]
    MissingColumn { source_id: String, column: String },

    /// The source definition cannot be used as written.
    #[error("[{id}] Invalid source definition: {message}")]
    InvalidDefinition { id: String, message: String },

    /// No source with this id is registered.
    #[error("Unknown source `{id}`")]
    UnknownSource { id: String },

    /// A filter constraint is out of range.
    #[error("Invalid filter: {message}")]
    InvalidFilter { message: String },
}
