//! Per-class standings state
//!
//! Lap histories per team, the ordering that ranks them, and the lead/lag
//! annotations written onto each completed lap.
//!
//! ## Gap notation
//! - `-mm:ss` / `+mm:ss`: time ahead of / behind the neighbouring team at the
//!   same lap
//! - `-Nv` / `+Nv`: whole laps ahead / behind
//! - `(-mm:ss)`: provisional lead, carried over from the previous lap until
//!   the team behind completes the matching lap
//! - [`OVERTAKE_MARKER`]: the team was behind its new down-team one lap ago

use crate::types::{Bib, ClassId, TeamId, Timestamp};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Lead shown when a team has just passed the team now below it
pub const OVERTAKE_MARKER: &str = "Plockar!";

/// One completed lap
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapInfo {
    /// When the lap was registered
    pub pass_time: Timestamp,
    /// Who rode it
    pub bib: Bib,
    /// Duration of the lap in seconds
    pub lap_time: f64,
    /// Team rank right after this lap
    pub rank: u32,
    /// Gap to the next worse team; may be filled in later
    pub lead: Option<String>,
    pub down_team: Option<TeamId>,
    /// Gap to the next better team
    pub lag: Option<String>,
    pub up_team: Option<TeamId>,
}

impl LapInfo {
    pub(crate) fn new(pass_time: Timestamp, bib: Bib, lap_time: f64) -> Self {
        Self {
            pass_time,
            bib,
            lap_time,
            rank: 0,
            lead: None,
            down_team: None,
            lag: None,
            up_team: None,
        }
    }
}

/// Lap history and current rank of one team
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamInfo {
    pub id: TeamId,
    pub(crate) laps: Vec<LapInfo>,
    /// None until the team has completed a lap
    pub(crate) rank: Option<u32>,
}

impl TeamInfo {
    pub fn new(id: TeamId) -> Self {
        Self {
            id,
            laps: Vec::new(),
            rank: None,
        }
    }

    pub fn laps(&self) -> &[LapInfo] {
        &self.laps
    }

    pub fn lap_count(&self) -> usize {
        self.laps.len()
    }

    pub fn rank(&self) -> Option<u32> {
        self.rank
    }

    pub fn last_lap(&self) -> Option<&LapInfo> {
        self.laps.last()
    }

    pub fn last_pass_time(&self) -> Option<Timestamp> {
        self.laps.last().map(|lap| lap.pass_time)
    }
}

/// Ranking order between two teams of the same class
///
/// More laps first; equal laps ranked by earlier last passage; team id
/// settles exact ties.
pub fn standing_order(a: &TeamInfo, b: &TeamInfo) -> Ordering {
    b.lap_count()
        .cmp(&a.lap_count())
        .then_with(|| {
            let a_time = a.last_pass_time().unwrap_or(0.0);
            let b_time = b.last_pass_time().unwrap_or(0.0);
            a_time.total_cmp(&b_time)
        })
        .then_with(|| a.id.cmp(&b.id))
}

/// Standings of one class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassInfo {
    pub id: ClassId,
    pub(crate) teams: BTreeMap<TeamId, TeamInfo>,
    /// Ranked team ids, best first; only teams with laps
    pub(crate) rank_list: Vec<TeamId>,
}

impl ClassInfo {
    pub fn new(id: ClassId, team_ids: impl IntoIterator<Item = TeamId>) -> Self {
        Self {
            id,
            teams: team_ids
                .into_iter()
                .map(|team_id| (team_id, TeamInfo::new(team_id)))
                .collect(),
            rank_list: Vec::new(),
        }
    }

    pub fn team(&self, team_id: TeamId) -> Option<&TeamInfo> {
        self.teams.get(&team_id)
    }

    pub fn teams(&self) -> impl Iterator<Item = &TeamInfo> {
        self.teams.values()
    }

    pub fn rank_list(&self) -> &[TeamId] {
        &self.rank_list
    }

    /// Recompute every rank in the class from scratch
    pub(crate) fn rerank(&mut self) {
        let mut ranked: Vec<&TeamInfo> = self
            .teams
            .values()
            .filter(|team| team.lap_count() > 0)
            .collect();
        ranked.sort_by(|a, b| standing_order(a, b));
        let rank_list: Vec<TeamId> = ranked.iter().map(|team| team.id).collect();

        for (index, team_id) in rank_list.iter().enumerate() {
            if let Some(team) = self.teams.get_mut(team_id) {
                team.rank = Some(index as u32 + 1);
            }
        }
        self.rank_list = rank_list;
    }

    /// Fill in rank, lead and lag on the newest lap of `team_id`
    ///
    /// Also back-fills the lead of the team above at the matching lap.
    pub(crate) fn annotate_last_lap(&mut self, team_id: TeamId) {
        let Some(team) = self.teams.get(&team_id) else {
            return;
        };
        let rank = team.rank;
        let lap_count = team.lap_count();
        if lap_count == 0 {
            return;
        }

        let mut down = None;
        let mut up = None;
        let mut lead = None;
        let mut lag = None;

        let position = self.rank_list.iter().position(|id| *id == team_id);
        if let Some(index) = position.filter(|_| self.rank_list.len() > 1) {
            down = self.rank_list.get(index + 1).copied();
            up = index.checked_sub(1).map(|i| self.rank_list[i]);

            lead = down
                .and_then(|down_id| self.teams.get(&down_id))
                .and_then(|down_team| lead_over(team, down_team));
            lag = up
                .and_then(|up_id| self.teams.get(&up_id))
                .map(|up_team| lag_behind(team, up_team));
        }

        if let Some(lap) = self.teams.get_mut(&team_id).and_then(|t| t.laps.last_mut()) {
            lap.rank = rank.unwrap_or(0);
            lap.down_team = down;
            lap.up_team = up;
            lap.lead = lead;
            lap.lag = lag.as_ref().map(|gap| gap.lag.clone());
        }

        if let (Some(up_id), Some(gap)) = (up, lag) {
            let matching = self
                .teams
                .get_mut(&up_id)
                .and_then(|t| t.laps.get_mut(lap_count - 1));
            if let Some(up_lap) = matching {
                up_lap.lead = Some(gap.up_lead);
            }
        }
    }
}

/// Lag of a team and the mirrored lead of the team above it
struct LagGap {
    lag: String,
    up_lead: String,
}

fn lead_over(team: &TeamInfo, down: &TeamInfo) -> Option<String> {
    let laps = team.lap_count();
    let down_laps = down.lap_count();

    if down_laps >= laps {
        let diff = down.laps[laps - 1].pass_time - team.laps[laps - 1].pass_time;
        return Some(format!("-{}", format_duration(diff)));
    }

    let lap_lead = laps - down_laps - 1;
    if lap_lead > 0 {
        return Some(format!("-{}v", lap_lead));
    }
    if laps < 2 {
        return None;
    }

    let diff = down.laps[laps - 2].pass_time - team.laps[laps - 2].pass_time;
    if diff < 0.0 {
        Some(OVERTAKE_MARKER.to_string())
    } else {
        Some(format!("(-{})", format_duration(diff)))
    }
}

fn lag_behind(team: &TeamInfo, up: &TeamInfo) -> LagGap {
    let laps = team.lap_count();
    let up_laps = up.lap_count();

    if up_laps == laps {
        let diff = team.laps[laps - 1].pass_time - up.laps[laps - 1].pass_time;
        let text = format_duration(diff);
        LagGap {
            lag: format!("+{}", text),
            up_lead: format!("-{}", text),
        }
    } else {
        let lap_diff = up_laps.abs_diff(laps);
        LagGap {
            lag: format!("+{}v", lap_diff),
            up_lead: format!("-{}v", lap_diff),
        }
    }
}

/// Format seconds as `mm:ss`, truncating fractions
///
/// Minutes are not rolled over into hours.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.trunc() as i64;
    let sign = if total < 0 { "-" } else { "" };
    let total = total.abs();
    format!("{}{:02}:{:02}", sign, total / 60, total % 60)
}
