//! Live standings from the race log
//!
//! The [`RankingEngine`] is a fold over log events. Each accepted lap is
//! appended to its team's history, the whole class is re-ranked and the new
//! lap gets its rank and gaps. A rejected line changes nothing and does not
//! stop the lines after it.

pub mod standings;
pub mod summary;

pub use standings::{
    format_duration, standing_order, ClassInfo, LapInfo, TeamInfo, OVERTAKE_MARKER,
};
pub use summary::{fastest_laps, format_clock, PersonalBest, TeamStanding};

use crate::diagnostics::Diagnostics;
use crate::race::RaceConfig;
use crate::start::StartClock;
use crate::types::{Bib, ClassId, Event, EventKind, RaceError, Result, TeamId, Timestamp};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Derives rankings and gaps by replaying events in order
pub struct RankingEngine {
    config: Arc<RaceConfig>,
    start_clock: StartClock,
    classes: BTreeMap<ClassId, ClassInfo>,
    /// Accepted passages, in log order
    lap_log: Vec<(Timestamp, Bib)>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl RankingEngine {
    /// Create an engine with no events applied
    pub fn new(config: Arc<RaceConfig>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        let start_clock = StartClock::new(&config, diagnostics.clone());
        let mut engine = Self {
            config,
            start_clock,
            classes: BTreeMap::new(),
            lap_log: Vec::new(),
            diagnostics,
        };
        engine.reset();
        engine
    }

    /// Return to the state before any event was applied
    pub fn reset(&mut self) {
        self.lap_log.clear();
        self.start_clock.reset();
        self.classes = self
            .config
            .class_ids()
            .into_iter()
            .map(|class_id| {
                let teams = self.config.team_ids_in_class(class_id);
                (class_id, ClassInfo::new(class_id, teams))
            })
            .collect();
    }

    /// Apply one log line, reporting a rejection to diagnostics
    ///
    /// Returns false if the line was rejected. Empty lines are accepted and
    /// change nothing.
    pub fn update(&mut self, line: &str) -> bool {
        match self.apply(line) {
            Ok(()) => true,
            Err(e) => {
                self.diagnostics.error(&e.to_string());
                false
            }
        }
    }

    /// Apply one log line
    pub fn apply(&mut self, line: &str) -> Result<()> {
        if line.trim_end_matches(['\r', '\n']).is_empty() {
            return Ok(());
        }
        let event = Event::parse(line)?;
        self.apply_event(&event)
    }

    /// Apply one parsed event
    pub fn apply_event(&mut self, event: &Event) -> Result<()> {
        log::trace!("Applying event {}", event);
        match event.kind() {
            EventKind::Start(classes) => self
                .start_clock
                .try_start_classes(&classes, event.timestamp)
                .map(|_| ()),
            EventKind::Lap(bib) => self.record_lap(bib, event.timestamp),
            EventKind::Blank | EventKind::Unknown => {
                Err(RaceError::MalformedLine(event.to_string()))
            }
        }
    }

    /// Apply events in order; returns how many were rejected
    pub fn replay<'a, I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut rejected = 0;
        for event in events {
            if let Err(e) = self.apply_event(event) {
                self.diagnostics.error(&format!("{}: {}", event, e));
                rejected += 1;
            }
        }
        rejected
    }

    fn record_lap(&mut self, bib: Bib, timestamp: Timestamp) -> Result<()> {
        let team_id = self
            .config
            .team_id_by_bib(bib)
            .ok_or(RaceError::UnknownBib(bib))?;
        let class_id = self
            .config
            .class_id_by_team(team_id)
            .ok_or(RaceError::UnknownBib(bib))?;
        let start_time = self
            .start_clock
            .start_time(class_id)
            .ok_or(RaceError::NotStarted(class_id))?;

        let class = self
            .classes
            .get_mut(&class_id)
            .ok_or(RaceError::UnknownBib(bib))?;
        let team = class
            .teams
            .get_mut(&team_id)
            .ok_or(RaceError::UnknownBib(bib))?;

        let previous = match team.last_pass_time() {
            Some(last) if timestamp <= last => Err(RaceError::OutOfOrder {
                bib,
                timestamp,
                previous: last,
            }),
            Some(last) => Ok(last),
            None if timestamp < start_time => Err(RaceError::OutOfOrder {
                bib,
                timestamp,
                previous: start_time,
            }),
            None => Ok(start_time),
        }?;

        // Nothing below can fail.
        team.laps
            .push(LapInfo::new(timestamp, bib, timestamp - previous));
        class.rerank();
        class.annotate_last_lap(team_id);
        self.lap_log.push((timestamp, bib));

        log::debug!(
            "Bib {} (team {}) lap {} at {}, rank {:?}",
            bib,
            team_id,
            self.get_lap_count_by_team_id(team_id),
            timestamp,
            self.get_team_ranking(team_id)
        );
        Ok(())
    }

    fn team_info(&self, team_id: TeamId) -> Option<&TeamInfo> {
        let class_id = self.config.class_id_by_team(team_id)?;
        self.classes.get(&class_id)?.team(team_id)
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn start_clock(&self) -> &StartClock {
        &self.start_clock
    }

    pub fn class_info(&self, class_id: ClassId) -> Option<&ClassInfo> {
        self.classes.get(&class_id)
    }

    /// Ranked team ids of a class, best first
    pub fn get_team_rankings(&self, class_id: ClassId) -> Vec<TeamId> {
        self.classes
            .get(&class_id)
            .map(|class| class.rank_list().to_vec())
            .unwrap_or_default()
    }

    /// Current rank; None until the team has a lap
    pub fn get_team_ranking(&self, team_id: TeamId) -> Option<u32> {
        self.team_info(team_id).and_then(TeamInfo::rank)
    }

    /// Rank at the team's second-to-last lap
    pub fn get_previous_team_ranking(&self, team_id: TeamId) -> Option<u32> {
        let laps = self.team_info(team_id)?.laps();
        laps.len()
            .checked_sub(2)
            .and_then(|index| laps.get(index))
            .map(|lap| lap.rank)
    }

    pub fn get_start_time(&self, class_id: ClassId) -> Option<Timestamp> {
        self.start_clock.start_time(class_id)
    }

    pub fn get_lap_info_list(&self, team_id: TeamId) -> &[LapInfo] {
        self.team_info(team_id)
            .map(TeamInfo::laps)
            .unwrap_or_default()
    }

    pub fn get_last_lap_info(&self, team_id: TeamId) -> Option<&LapInfo> {
        self.team_info(team_id)?.last_lap()
    }

    /// Duration of the team's latest lap
    pub fn get_last_lap_time(&self, team_id: TeamId) -> Option<f64> {
        self.get_last_lap_info(team_id).map(|lap| lap.lap_time)
    }

    /// Lap by zero-based index
    pub fn get_lap_info_by_index(&self, team_id: TeamId, index: usize) -> Option<&LapInfo> {
        self.get_lap_info_list(team_id).get(index)
    }

    pub fn get_lap_info_by_timestamp(
        &self,
        team_id: TeamId,
        timestamp: Timestamp,
    ) -> Option<&LapInfo> {
        self.get_lap_info_list(team_id)
            .iter()
            .find(|lap| lap.pass_time == timestamp)
    }

    /// (pass time, bib) for every lap of the team
    pub fn get_lap_list(&self, team_id: TeamId) -> Vec<(Timestamp, Bib)> {
        self.get_lap_info_list(team_id)
            .iter()
            .map(|lap| (lap.pass_time, lap.bib))
            .collect()
    }

    /// (lap duration, bib) for every lap of the team
    pub fn get_lap_times(&self, team_id: TeamId) -> Vec<(f64, Bib)> {
        self.get_lap_info_list(team_id)
            .iter()
            .map(|lap| (lap.lap_time, lap.bib))
            .collect()
    }

    pub fn get_lap_count_by_team_id(&self, team_id: TeamId) -> usize {
        self.get_lap_info_list(team_id).len()
    }

    /// Laps ridden by one person
    pub fn get_lap_count_by_bib(&self, bib: Bib) -> usize {
        self.config
            .team_id_by_bib(bib)
            .map(|team_id| {
                self.get_lap_info_list(team_id)
                    .iter()
                    .filter(|lap| lap.bib == bib)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Every accepted passage in log order
    pub fn get_lap_log(&self) -> &[(Timestamp, Bib)] {
        &self.lap_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemoryDiagnostics;
    use crate::race::{Class, Person, Team};

    const START_TIME: Timestamp = 1354301000.0;
    const CID: ClassId = 0;

    struct Fixture {
        engine: RankingEngine,
        diagnostics: Arc<MemoryDiagnostics>,
    }

    impl Fixture {
        fn new() -> Self {
            let names = ["Anna", "Bertil", "Carina", "David"];
            let persons = names
                .iter()
                .enumerate()
                .map(|(i, name)| Person::new(i as Bib + 1, *name))
                .collect();
            let teams = names
                .iter()
                .enumerate()
                .map(|(i, name)| Team::new(CID, *name, &[i as Bib + 1]).unwrap())
                .collect();
            let config =
                RaceConfig::new(vec![Class::new(CID, 1, "Solo")], persons, teams).unwrap();

            let diagnostics = Arc::new(MemoryDiagnostics::new());
            let engine = RankingEngine::new(Arc::new(config), diagnostics.clone());
            Self {
                engine,
                diagnostics,
            }
        }

        fn start(&mut self) {
            assert!(self.engine.update(&format!("{},start all\n", START_TIME)));
        }

        fn event(&mut self, offset: f64, bib: Bib) -> bool {
            self.engine
                .update(&format!("{},{}\n", START_TIME + offset, bib))
        }

        fn lead(&self, team_id: TeamId) -> Option<&str> {
            self.engine
                .get_last_lap_info(team_id)
                .and_then(|lap| lap.lead.as_deref())
        }

        fn lag(&self, team_id: TeamId) -> Option<&str> {
            self.engine
                .get_last_lap_info(team_id)
                .and_then(|lap| lap.lag.as_deref())
        }
    }

    #[test]
    fn test_empty_line_is_accepted() {
        let mut f = Fixture::new();
        assert!(f.engine.update(""));
        assert!(f.engine.update("\n"));
        assert!(f.diagnostics.entries().is_empty());
    }

    #[test]
    fn test_start_time() {
        let mut f = Fixture::new();
        assert_eq!(f.engine.get_start_time(CID), None);
        assert!(f.engine.update(&format!("{},start {}", START_TIME, CID)));
        assert_eq!(f.engine.get_start_time(CID), Some(START_TIME));
    }

    #[test]
    fn test_first_lap_leads() {
        let mut f = Fixture::new();
        f.start();
        assert!(f.event(1000.0, 4));
        assert_eq!(f.engine.get_team_rankings(CID), vec![4]);
        assert_eq!(f.engine.get_team_ranking(4), Some(1));
        assert_eq!(f.lead(4), None);
        assert_eq!(f.lag(4), None);
    }

    #[test]
    fn test_simple_lead_lag_time() {
        let mut f = Fixture::new();
        f.start();
        f.event(1000.0, 4);
        f.event(1001.0, 3);
        assert_eq!(f.engine.get_team_rankings(CID), vec![4, 3]);
        assert_eq!(f.lead(4), Some("-00:01"));
        assert_eq!(f.lag(3), Some("+00:01"));

        let lap = f.engine.get_last_lap_info(3).unwrap();
        assert_eq!(lap.up_team, Some(4));
        assert_eq!(lap.down_team, None);
        assert_eq!(lap.rank, 2);
    }

    #[test]
    fn test_provisional_lead_until_team_behind_catches_up() {
        let mut f = Fixture::new();
        f.start();
        f.event(1000.0, 1);
        f.event(1020.0, 2);
        assert_eq!(f.lead(1), Some("-00:20"));

        f.event(2518.0, 1);
        assert_eq!(f.lead(1), Some("(-00:20)"));

        f.event(2553.0, 2);
        assert_eq!(f.lead(1), Some("-00:35"));
        assert_eq!(f.lag(2), Some("+00:35"));
    }

    #[test]
    fn test_overtake_marker() {
        let mut f = Fixture::new();
        f.start();
        f.event(100.0, 1);
        f.event(102.0, 2);
        f.event(104.0, 3);
        f.event(150.0, 2);

        assert_eq!(f.lead(2), Some(OVERTAKE_MARKER));
        assert_eq!(f.engine.get_team_ranking(2), Some(1));
        assert_eq!(f.engine.get_previous_team_ranking(2), Some(2));
    }

    #[test]
    fn test_lead_in_whole_laps() {
        let mut f = Fixture::new();
        f.start();
        f.event(1000.0, 4);
        f.event(1001.0, 3);
        f.event(1002.0, 4);
        f.event(1003.0, 4);
        assert_eq!(f.lead(4), Some("-1v"));

        f.event(1004.0, 3);
        assert_eq!(f.lag(3), Some("+1v"));
        assert_eq!(
            f.engine.get_lap_info_by_index(4, 1).unwrap().lead.as_deref(),
            Some("-1v")
        );
    }

    #[test]
    fn test_team_rankings() {
        let mut f = Fixture::new();
        f.start();
        for (offset, bib) in [
            (1000.0, 4),
            (1010.0, 3),
            (1020.0, 1),
            (1030.0, 4),
            (1040.0, 4),
            (1050.0, 1),
            (1060.0, 1),
        ] {
            assert!(f.event(offset, bib));
        }
        assert_eq!(f.engine.get_team_rankings(CID), vec![4, 1, 3]);
        f.event(1070.0, 1);
        assert_eq!(f.engine.get_team_rankings(CID), vec![1, 4, 3]);
        f.event(1080.0, 2);
        f.event(1090.0, 2);
        assert_eq!(f.engine.get_team_rankings(CID), vec![1, 4, 2, 3]);
    }

    #[test]
    fn test_last_lap_time() {
        let mut f = Fixture::new();
        f.start();
        f.event(1000.0, 1);
        f.event(1010.0, 1);
        f.event(1021.0, 1);
        assert_eq!(f.engine.get_last_lap_time(1), Some(11.0));
        assert_eq!(f.engine.get_lap_info_by_index(1, 0).unwrap().lap_time, 1000.0);
        assert_eq!(f.engine.get_lap_count_by_bib(1), 3);
        assert_eq!(f.engine.get_lap_count_by_team_id(1), 3);
        assert_eq!(
            f.engine
                .get_lap_info_by_timestamp(1, START_TIME + 1010.0)
                .map(|lap| lap.lap_time),
            Some(10.0)
        );
    }

    #[test]
    fn test_lap_before_start_is_rejected() {
        let mut f = Fixture::new();
        assert!(!f.event(10.0, 1));
        assert!(f.engine.get_team_rankings(CID).is_empty());
        assert!(f.engine.get_lap_log().is_empty());
        assert_eq!(f.diagnostics.errors(), vec!["Class 0 has not yet started"]);
    }

    #[test]
    fn test_rejected_lines_change_nothing() {
        let mut f = Fixture::new();
        f.start();
        f.event(100.0, 1);

        assert!(!f.engine.update("abc,1"));
        assert!(!f.engine.update("1354301200,99"));
        assert!(!f.engine.update("1354301200,x1"));
        assert!(!f.engine.update("1354301200,"));
        assert!(!f.event(50.0, 1));
        assert!(!f.event(100.0, 1));
        assert!(!f.engine.update(&format!("{},start all", START_TIME + 5.0)));

        assert_eq!(f.diagnostics.errors().len(), 7);
        assert_eq!(f.engine.get_lap_count_by_team_id(1), 1);
        assert_eq!(f.engine.get_lap_log(), &[(START_TIME + 100.0, 1)]);
        assert_eq!(f.engine.get_start_time(CID), Some(START_TIME));

        assert!(f.event(200.0, 2));
        assert_eq!(f.engine.get_team_rankings(CID), vec![1, 2]);
    }

    #[test]
    fn test_pass_time_boundaries() {
        let mut f = Fixture::new();
        f.start();
        assert!(!f.event(-1.0, 1));
        assert!(f.event(0.0, 1));
        assert_eq!(f.engine.get_last_lap_time(1), Some(0.0));

        assert!(!f.event(0.0, 1));
        assert!(f.event(0.5, 1));
        assert_eq!(f.engine.get_lap_count_by_team_id(1), 2);
        assert_eq!(f.engine.get_last_lap_time(1), Some(0.5));
    }

    #[test]
    fn test_reset() {
        let mut f = Fixture::new();
        f.start();
        f.event(100.0, 1);
        f.engine.reset();
        assert_eq!(f.engine.get_start_time(CID), None);
        assert!(f.engine.get_team_rankings(CID).is_empty());
        assert_eq!(f.engine.get_lap_count_by_team_id(1), 0);
    }

    #[test]
    fn test_unknown_team_queries() {
        let f = Fixture::new();
        assert!(f.engine.get_lap_info_list(42).is_empty());
        assert_eq!(f.engine.get_team_ranking(42), None);
        assert_eq!(f.engine.get_previous_team_ranking(1), None);
        assert_eq!(f.engine.get_lap_count_by_bib(42), 0);
    }
}
