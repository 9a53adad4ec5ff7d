//! Text and JSON views of the current standings

use chrono::Local;
use laptime_core::ranking::{fastest_laps, format_clock, format_duration};
use laptime_core::{
    wall_clock, ClassId, EventKind, EventLog, RaceConfig, RankingEngine, TeamStanding, Timestamp,
};
use serde::Serialize;
use std::fmt::Write;

/// Standings of one class, as emitted with `--json`
#[derive(Debug, Serialize)]
pub struct ClassReport<'a> {
    pub class_id: ClassId,
    pub name: &'a str,
    pub start_time: Option<Timestamp>,
    pub teams: Vec<TeamReport<'a>>,
}

#[derive(Debug, Serialize)]
pub struct TeamReport<'a> {
    pub name: &'a str,
    #[serde(flatten)]
    pub standing: TeamStanding,
}

/// Collect the reports for every class, or just `only`
pub fn class_reports<'a>(
    engine: &RankingEngine,
    config: &'a RaceConfig,
    only: Option<ClassId>,
) -> Vec<ClassReport<'a>> {
    config
        .class_ids()
        .into_iter()
        .filter(|id| only.map_or(true, |only| only == *id))
        .map(|class_id| ClassReport {
            class_id,
            name: config.class_name(class_id).unwrap_or_default(),
            start_time: engine.get_start_time(class_id),
            teams: engine
                .class_standings(class_id)
                .into_iter()
                .map(|standing| TeamReport {
                    name: config.team_name(standing.team_id).unwrap_or_default(),
                    standing,
                })
                .collect(),
        })
        .collect()
}

pub fn standings_json(reports: &[ClassReport<'_>]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}

/// Rank change since the previous lap: "+1" for a gained place
pub fn rank_delta(standing: &TeamStanding) -> String {
    match standing.previous_rank {
        Some(previous) if previous != standing.rank => {
            format!("{:+}", i64::from(previous) - i64::from(standing.rank))
        }
        _ => String::new(),
    }
}

pub fn standings_text(reports: &[ClassReport<'_>]) -> String {
    let mut out = String::new();

    for class in reports {
        let start = class
            .start_time
            .map(|ts| format!("started {}", clock_time(ts)))
            .unwrap_or_else(|| "not started".to_string());
        let _ = writeln!(out, "{} ({})", class.name, start);

        if class.teams.is_empty() {
            let _ = writeln!(out, "  No laps yet");
            out.push('\n');
            continue;
        }

        let _ = writeln!(
            out,
            "  {:>4} {:>3}  {:<24} {:>4} {:>8} {:>9} {:>9}",
            "Rank", "", "Team", "Laps", "Last", "Lead", "Lag"
        );
        for team in &class.teams {
            let standing = &team.standing;
            let last = standing.last_lap.as_ref();
            let _ = writeln!(
                out,
                "  {:>4} {:>3}  {:<24} {:>4} {:>8} {:>9} {:>9}",
                standing.rank,
                rank_delta(standing),
                team.name,
                standing.lap_count,
                last.map(|lap| format_duration(lap.lap_time))
                    .unwrap_or_default(),
                last.and_then(|lap| lap.lead.as_deref()).unwrap_or(""),
                last.and_then(|lap| lap.lag.as_deref()).unwrap_or(""),
            );
        }
        out.push('\n');
    }

    out
}

/// The last `count` log events with local wall-clock time
pub fn tail_text(log: &EventLog, count: usize, config: &RaceConfig) -> String {
    let mut out = String::new();
    let first_index = log.len().saturating_sub(count);

    for (offset, event) in log.tail(count).iter().enumerate() {
        let what = match event.kind() {
            EventKind::Lap(bib) => match config.person_name(bib) {
                Some(name) => format!("{} {}", bib, name),
                None => format!("{} (unknown bib)", bib),
            },
            _ => event.text.clone(),
        };
        let _ = writeln!(
            out,
            "{:>5}  {}  {}",
            first_index + offset,
            clock_time(event.timestamp),
            what
        );
    }

    out
}

/// Personal best laps, most laps ridden first, then the overall fastest
pub fn top_text(engine: &RankingEngine, config: &RaceConfig, count: usize) -> String {
    let bests = engine.personal_bests(count);
    let name = |bib| config.person_name(bib).unwrap_or_default();
    let mut out = String::new();

    let _ = writeln!(out, "{:<24} {:>4}  Best laps", "Name", "Laps");
    for best in &bests {
        let laps: Vec<String> = best
            .best_laps
            .iter()
            .map(|(lap, time)| format!("#{} {}", lap, format_clock(*time)))
            .collect();
        let _ = writeln!(
            out,
            "{:<24} {:>4}  {}",
            name(best.bib),
            best.lap_count,
            laps.join(", ")
        );
    }

    out.push('\n');
    let _ = writeln!(out, "{:<24} {:>4}  Time", "Name", "Lap");
    for (bib, lap, time) in fastest_laps(&bests) {
        let _ = writeln!(out, "{:<24} {:>4}  {}", name(bib), lap, format_clock(time));
    }

    out
}

fn clock_time(timestamp: Timestamp) -> String {
    wall_clock(timestamp)
        .map(|time| time.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
