//! Race configuration database
//!
//! Classes, persons and teams of one race, with the lookups the ranking engine
//! and reports need. Built once, validated, then read-only.

use crate::types::{Bib, ClassId, RaceError, Result, TeamId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A competition class, e.g. "Ladies solo" or "Team 3 Mixed"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub id: ClassId,
    /// Maximum number of members per team in this class
    pub max_team_size: usize,
    pub name: String,
}

impl Class {
    pub fn new(id: ClassId, max_team_size: usize, name: impl Into<String>) -> Self {
        Self {
            id,
            max_team_size,
            name: name.into(),
        }
    }

    /// True for classes where every team has exactly one member
    pub fn is_solo(&self) -> bool {
        self.max_team_size == 1
    }
}

/// A participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub bib: Bib,
    pub name: String,
}

impl Person {
    pub fn new(bib: Bib, name: impl Into<String>) -> Self {
        Self {
            bib,
            name: name.into(),
        }
    }
}

/// A team entered in one class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Lowest member bib
    pub id: TeamId,
    pub class_id: ClassId,
    pub name: String,
    members: BTreeSet<Bib>,
}

impl Team {
    /// Create a team; fails for an empty or repeated member list
    pub fn new(class_id: ClassId, name: impl Into<String>, members: &[Bib]) -> Result<Self> {
        let name = name.into();
        let mut set = BTreeSet::new();
        for &bib in members {
            if !set.insert(bib) {
                return Err(RaceError::InvalidConfig(format!(
                    "Person with number {} is already in team \"{}\"",
                    bib, name
                )));
            }
        }
        let id = *set.iter().next().ok_or_else(|| {
            RaceError::InvalidConfig(format!("Team \"{}\" has no members", name))
        })?;

        Ok(Self {
            id,
            class_id,
            name,
            members: set,
        })
    }

    pub fn is_member(&self, bib: Bib) -> bool {
        self.members.contains(&bib)
    }

    /// Member bibs in ascending order
    pub fn bibs(&self) -> Vec<Bib> {
        self.members.iter().copied().collect()
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Validated race configuration
#[derive(Debug, Clone, Default)]
pub struct RaceConfig {
    classes: BTreeMap<ClassId, Class>,
    persons: BTreeMap<Bib, Person>,
    teams: BTreeMap<TeamId, Team>,
    /// Bib -> team id, for the lap path
    team_lookup: HashMap<Bib, TeamId>,
}

/// Size of a loaded configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceStats {
    pub num_classes: usize,
    pub num_persons: usize,
    pub num_teams: usize,
}

impl RaceConfig {
    /// Build a configuration, checking that classes, persons and teams agree
    pub fn new(classes: Vec<Class>, persons: Vec<Person>, teams: Vec<Team>) -> Result<Self> {
        let mut config = RaceConfig::default();

        for class in classes {
            if config.classes.contains_key(&class.id) {
                return Err(invalid(format!(
                    "There is already a class with number {}",
                    class.id
                )));
            }
            if config.classes.values().any(|c| c.name == class.name) {
                return Err(invalid(format!(
                    "There is already a class with name {}",
                    class.name
                )));
            }
            config.classes.insert(class.id, class);
        }

        for person in persons {
            if config.persons.contains_key(&person.bib) {
                return Err(invalid(format!(
                    "There is already a person with number {}",
                    person.bib
                )));
            }
            config.persons.insert(person.bib, person);
        }

        for team in teams {
            config.add_team(team)?;
        }

        if let Some(person) = config
            .persons
            .values()
            .find(|p| !config.team_lookup.contains_key(&p.bib))
        {
            return Err(invalid(format!(
                "Person {} {} is not in any team",
                person.bib, person.name
            )));
        }

        log::debug!(
            "Race configuration built: {} classes, {} persons, {} teams",
            config.classes.len(),
            config.persons.len(),
            config.teams.len()
        );
        Ok(config)
    }

    fn add_team(&mut self, team: Team) -> Result<()> {
        let class = self.classes.get(&team.class_id).ok_or_else(|| {
            invalid(format!("No class with id {} is defined", team.class_id))
        })?;

        if team.size() > class.max_team_size {
            return Err(invalid(format!(
                "Too many members in team \"{}\" ({} > {})",
                team.name,
                team.size(),
                class.max_team_size
            )));
        }

        if self.teams.values().any(|t| t.name == team.name) {
            return Err(invalid(format!(
                "There is already a team called {}",
                team.name
            )));
        }

        for bib in team.bibs() {
            if !self.persons.contains_key(&bib) {
                return Err(invalid(format!("There is no person with number {}", bib)));
            }
            if self.team_lookup.contains_key(&bib) {
                return Err(invalid(format!(
                    "Person with number {} is already in another team",
                    bib
                )));
            }
        }

        for bib in team.bibs() {
            self.team_lookup.insert(bib, team.id);
        }
        self.teams.insert(team.id, team);
        Ok(())
    }

    /// All class ids in ascending order
    pub fn class_ids(&self) -> Vec<ClassId> {
        self.classes.keys().copied().collect()
    }

    pub fn class(&self, class_id: ClassId) -> Option<&Class> {
        self.classes.get(&class_id)
    }

    pub fn class_name(&self, class_id: ClassId) -> Option<&str> {
        self.classes.get(&class_id).map(|c| c.name.as_str())
    }

    pub fn team_id_by_bib(&self, bib: Bib) -> Option<TeamId> {
        self.team_lookup.get(&bib).copied()
    }

    pub fn class_id_by_team(&self, team_id: TeamId) -> Option<ClassId> {
        self.teams.get(&team_id).map(|t| t.class_id)
    }

    pub fn class_id_by_bib(&self, bib: Bib) -> Option<ClassId> {
        self.team_id_by_bib(bib)
            .and_then(|team_id| self.class_id_by_team(team_id))
    }

    /// Ids of all teams entered in a class, ascending
    pub fn team_ids_in_class(&self, class_id: ClassId) -> Vec<TeamId> {
        self.teams
            .values()
            .filter(|t| t.class_id == class_id)
            .map(|t| t.id)
            .collect()
    }

    /// True if the bib races in a solo class
    pub fn is_solo(&self, bib: Bib) -> bool {
        self.class_id_by_bib(bib)
            .and_then(|class_id| self.classes.get(&class_id))
            .is_some_and(Class::is_solo)
    }

    pub fn is_solo_team(&self, team_id: TeamId) -> bool {
        self.class_id_by_team(team_id)
            .and_then(|class_id| self.classes.get(&class_id))
            .is_some_and(Class::is_solo)
    }

    pub fn person_name(&self, bib: Bib) -> Option<&str> {
        self.persons.get(&bib).map(|p| p.name.as_str())
    }

    /// All bibs in ascending order
    pub fn person_bibs(&self) -> Vec<Bib> {
        self.persons.keys().copied().collect()
    }

    pub fn team(&self, team_id: TeamId) -> Option<&Team> {
        self.teams.get(&team_id)
    }

    pub fn team_name(&self, team_id: TeamId) -> Option<&str> {
        self.teams.get(&team_id).map(|t| t.name.as_str())
    }

    pub fn team_bibs(&self, team_id: TeamId) -> Vec<Bib> {
        self.teams
            .get(&team_id)
            .map(Team::bibs)
            .unwrap_or_default()
    }

    pub fn team_ids(&self) -> Vec<TeamId> {
        self.teams.keys().copied().collect()
    }

    pub fn stats(&self) -> RaceStats {
        RaceStats {
            num_classes: self.classes.len(),
            num_persons: self.persons.len(),
            num_teams: self.teams.len(),
        }
    }
}

fn invalid(message: String) -> RaceError {
    RaceError::InvalidConfig(message)
}
