//! Lap Timing Library
//!
//! Live standings for multi-class lap races, derived from an append-only log
//! of `timestamp,event` lines that several processes share on disk.
//!
//! # Architecture
//!
//! - [`race`]: static configuration of classes, persons and teams
//! - [`start`]: which classes have started, and when
//! - [`journal`]: the event log in memory and on disk, its lock file and
//!   change notifications
//! - [`ranking`]: replays events into per-class rankings with lead/lag gaps
//!
//! The library never prints. Rejected input and warnings go to a
//! [`Diagnostics`] sink chosen by the caller.
//!
//! # Example Usage
//!
//! ```no_run
//! use laptime_core::{load_race_file, LogDiagnostics, LogFile, RankingEngine};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = Arc::new(load_race_file(Path::new("race.toml")).unwrap());
//! let diagnostics = LogDiagnostics::shared();
//!
//! let log = LogFile::new("race.log", diagnostics.clone()).load().unwrap();
//!
//! let mut engine = RankingEngine::new(config.clone(), diagnostics);
//! let rejected = engine.replay(&log);
//! println!("{} lines rejected", rejected);
//!
//! for class_id in config.class_ids() {
//!     for row in engine.class_standings(class_id) {
//!         println!("{} {} laps", row.rank, row.lap_count);
//!     }
//! }
//! ```

// Public modules
pub mod diagnostics;
pub mod journal;
pub mod race;
pub mod ranking;
pub mod start;
pub mod types;

// Re-export main types for convenience
pub use diagnostics::{Diagnostics, LogDiagnostics, MemoryDiagnostics, Severity};
pub use journal::{
    ChangeListener, ChangeNotifier, EventLog, LockPolicy, LogFile, LogLock, NullNotifier,
    UdpNotifier,
};
pub use race::{load_race_file, parse_race_config, Class, Person, RaceConfig, RaceStats, Team};
pub use ranking::{ClassInfo, LapInfo, PersonalBest, RankingEngine, TeamInfo, TeamStanding};
pub use start::{StartClock, START_ALL};
pub use types::{
    now_timestamp, wall_clock, Bib, ClassId, ErrorKind, Event, EventKind, RaceError, Result,
    TeamId, Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty race ranks nothing
        let engine = RankingEngine::new(
            Arc::new(RaceConfig::default()),
            Arc::new(MemoryDiagnostics::new()),
        );
        assert!(engine.get_lap_log().is_empty());
        assert_eq!(RaceConfig::default().stats().num_teams, 0);
    }
}
