//! Race configuration file loader
//!
//! Reads a TOML race description and converts it into a validated
//! [`RaceConfig`]. A person entry may carry a `class`, which enters that
//! person as a solo team of their own.
//!
//! ```toml
//! [[classes]]
//! id = 1
//! max_team_size = 1
//! name = "Ladies solo"
//!
//! [[persons]]
//! bib = 11
//! name = "Anna"
//! class = 1
//!
//! [[teams]]
//! class = 3
//! name = "Fast Four"
//! members = [31, 32, 33]
//! ```

use crate::race::config::{Class, Person, RaceConfig, Team};
use crate::types::{Bib, ClassId, RaceError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RaceFile {
    #[serde(default)]
    classes: Vec<ClassEntry>,
    #[serde(default)]
    persons: Vec<PersonEntry>,
    #[serde(default)]
    teams: Vec<TeamEntry>,
}

#[derive(Debug, Deserialize)]
struct ClassEntry {
    id: ClassId,
    max_team_size: usize,
    name: String,
}

#[derive(Debug, Deserialize)]
struct PersonEntry {
    bib: Bib,
    name: String,
    /// Solo entry: the person races alone in this class
    class: Option<ClassId>,
}

#[derive(Debug, Deserialize)]
struct TeamEntry {
    class: ClassId,
    name: String,
    members: Vec<Bib>,
}

/// Load a race configuration from a TOML file
pub fn load_race_file(path: &Path) -> Result<RaceConfig> {
    log::info!("Loading race configuration: {:?}", path);

    let content = std::fs::read_to_string(path)?;
    let config = parse_race_config(&content).map_err(|e| match e {
        RaceError::InvalidConfig(message) => {
            RaceError::InvalidConfig(format!("{}: {}", path.display(), message))
        }
        other => other,
    })?;

    let stats = config.stats();
    log::info!(
        "Loaded {} classes, {} persons and {} teams from {:?}",
        stats.num_classes,
        stats.num_persons,
        stats.num_teams,
        path
    );
    Ok(config)
}

/// Parse a race configuration from TOML text
pub fn parse_race_config(content: &str) -> Result<RaceConfig> {
    let file: RaceFile = toml::from_str(content)?;

    let classes = file
        .classes
        .into_iter()
        .map(|c| Class::new(c.id, c.max_team_size, c.name))
        .collect();

    let mut teams = Vec::with_capacity(file.persons.len() + file.teams.len());
    let mut persons = Vec::with_capacity(file.persons.len());
    for entry in file.persons {
        if let Some(class_id) = entry.class {
            teams.push(Team::new(class_id, entry.name.clone(), &[entry.bib])?);
        }
        persons.push(Person::new(entry.bib, entry.name));
    }

    for entry in file.teams {
        teams.push(Team::new(entry.class, entry.name, &entry.members)?);
    }

    RaceConfig::new(classes, persons, teams)
}
