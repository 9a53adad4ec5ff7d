//! Derived views over the engine state: class tables and personal bests

use super::{LapInfo, RankingEngine};
use crate::types::{Bib, ClassId, TeamId};
use serde::Serialize;

/// One row of a class standings table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStanding {
    pub team_id: TeamId,
    pub rank: u32,
    pub previous_rank: Option<u32>,
    pub lap_count: usize,
    pub last_lap: Option<LapInfo>,
}

/// Fastest laps of one person
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalBest {
    pub bib: Bib,
    /// Laps ridden by this person
    pub lap_count: usize,
    /// (team lap number, lap time), fastest first
    pub best_laps: Vec<(usize, f64)>,
}

impl RankingEngine {
    /// Ranked teams of a class with their latest lap
    pub fn class_standings(&self, class_id: ClassId) -> Vec<TeamStanding> {
        self.get_team_rankings(class_id)
            .into_iter()
            .enumerate()
            .map(|(index, team_id)| TeamStanding {
                team_id,
                rank: self.get_team_ranking(team_id).unwrap_or(index as u32 + 1),
                previous_rank: self.get_previous_team_ranking(team_id),
                lap_count: self.get_lap_count_by_team_id(team_id),
                last_lap: self.get_last_lap_info(team_id).cloned(),
            })
            .collect()
    }

    /// Up to `n` fastest laps per person, most laps ridden first
    ///
    /// A person's first lap includes the start and is left out.
    pub fn personal_bests(&self, n: usize) -> Vec<PersonalBest> {
        let mut bests: Vec<PersonalBest> = self
            .config()
            .person_bibs()
            .into_iter()
            .filter_map(|bib| {
                let team_id = self.config().team_id_by_bib(bib)?;
                let laps: Vec<(usize, f64)> = self
                    .get_lap_info_list(team_id)
                    .iter()
                    .enumerate()
                    .filter(|(_, lap)| lap.bib == bib)
                    .map(|(index, lap)| (index + 1, lap.lap_time))
                    .collect();
                if laps.is_empty() {
                    return None;
                }

                let mut best_laps = laps[1..].to_vec();
                best_laps.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                best_laps.truncate(n);
                Some(PersonalBest {
                    bib,
                    lap_count: laps.len(),
                    best_laps,
                })
            })
            .collect();

        bests.sort_by(|a, b| b.lap_count.cmp(&a.lap_count).then(a.bib.cmp(&b.bib)));
        bests
    }
}

/// Every personal best lap as (bib, team lap number, lap time), fastest first
pub fn fastest_laps(bests: &[PersonalBest]) -> Vec<(Bib, usize, f64)> {
    let mut laps: Vec<(Bib, usize, f64)> = bests
        .iter()
        .flat_map(|best| {
            best.best_laps
                .iter()
                .map(move |&(lap, time)| (best.bib, lap, time))
        })
        .collect();
    laps.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)));
    laps
}

/// Format seconds as `hh:mm:ss`, truncating fractions
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).trunc() as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        total % 3600 / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemoryDiagnostics;
    use crate::race::{Class, Person, RaceConfig, Team};
    use std::sync::Arc;

    fn engine() -> RankingEngine {
        let config = RaceConfig::new(
            vec![Class::new(1, 1, "Solo"), Class::new(2, 2, "Pairs")],
            vec![
                Person::new(1, "Anna"),
                Person::new(2, "Bertil"),
                Person::new(3, "Carina"),
                Person::new(4, "David"),
            ],
            vec![
                Team::new(1, "Anna", &[1]).unwrap(),
                Team::new(1, "Bertil", &[2]).unwrap(),
                Team::new(2, "Pair", &[3, 4]).unwrap(),
            ],
        )
        .unwrap();
        RankingEngine::new(Arc::new(config), Arc::new(MemoryDiagnostics::new()))
    }

    #[test]
    fn test_class_standings() {
        let mut engine = engine();
        for line in ["0,start all", "100,1", "110,2", "200,2", "230,1"] {
            assert!(engine.update(line));
        }

        let table = engine.class_standings(1);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].team_id, 2);
        assert_eq!(table[0].rank, 1);
        assert_eq!(table[0].previous_rank, Some(2));
        assert_eq!(table[1].team_id, 1);
        assert_eq!(table[1].lap_count, 2);
        assert_eq!(
            table[1].last_lap.as_ref().and_then(|lap| lap.lag.as_deref()),
            Some("+00:30")
        );
        assert!(engine.class_standings(2).is_empty());
    }

    #[test]
    fn test_personal_bests_skip_first_lap() {
        let mut engine = engine();
        for line in [
            "0,start all",
            "50,3",
            "90,4",
            "120,3",
            "170,4",
            "215,4",
            "300,1",
        ] {
            assert!(engine.update(line));
        }

        let bests = engine.personal_bests(3);
        let bibs: Vec<Bib> = bests.iter().map(|b| b.bib).collect();
        assert_eq!(bibs, vec![4, 3, 1]);

        assert_eq!(bests[0].lap_count, 3);
        assert_eq!(bests[0].best_laps, vec![(5, 45.0), (4, 50.0)]);
        assert_eq!(bests[1].best_laps, vec![(3, 30.0)]);
        assert!(bests[2].best_laps.is_empty());

        assert_eq!(engine.personal_bests(1)[0].best_laps, vec![(5, 45.0)]);
        assert_eq!(
            fastest_laps(&bests),
            vec![(3, 3, 30.0), (4, 5, 45.0), (4, 4, 50.0)]
        );
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00:00");
        assert_eq!(format_clock(3725.9), "01:02:05");
    }
}
