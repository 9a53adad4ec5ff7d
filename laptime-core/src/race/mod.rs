//! Race configuration: classes, persons and teams
//!
//! This module contains the read-only configuration database and the loader
//! that builds it from a race description file.

pub mod config;
pub mod loader;

// Re-export key types for convenience
pub use config::{Class, Person, RaceConfig, RaceStats, Team};
pub use loader::{load_race_file, parse_race_config};
