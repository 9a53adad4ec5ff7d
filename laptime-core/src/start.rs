//! Class start bookkeeping
//!
//! Tracks whether each class has started and when. A start request is checked
//! as a whole before anything is changed, and a started class stays started.

use crate::diagnostics::Diagnostics;
use crate::race::RaceConfig;
use crate::types::{ClassId, RaceError, Result, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Keyword that starts every class at once
pub const START_ALL: &str = "all";

#[derive(Debug, Clone)]
struct ClassStart {
    name: String,
    started_at: Option<Timestamp>,
}

/// Per-class start state
pub struct StartClock {
    classes: BTreeMap<ClassId, ClassStart>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl StartClock {
    /// Create a clock with every configured class not yet started
    pub fn new(config: &RaceConfig, diagnostics: Arc<dyn Diagnostics>) -> Self {
        let classes = config
            .class_ids()
            .into_iter()
            .map(|id| {
                let name = config.class_name(id).unwrap_or_default().to_string();
                (
                    id,
                    ClassStart {
                        name,
                        started_at: None,
                    },
                )
            })
            .collect();

        Self {
            classes,
            diagnostics,
        }
    }

    /// Forget all start times
    pub fn reset(&mut self) {
        for class in self.classes.values_mut() {
            class.started_at = None;
        }
    }

    /// Start the requested classes, reporting any problem to diagnostics
    ///
    /// Returns true if the classes were started.
    pub fn start_classes(&mut self, request: &[&str], timestamp: Timestamp) -> bool {
        match self.try_start_classes(request, timestamp) {
            Ok(_) => true,
            Err(e) => {
                self.diagnostics.error(&e.to_string());
                false
            }
        }
    }

    /// Start the requested classes, or none of them
    ///
    /// `request` holds class ids as text, or the single keyword `all`.
    /// Returns the ids that were started.
    pub fn try_start_classes(
        &mut self,
        request: &[&str],
        timestamp: Timestamp,
    ) -> Result<Vec<ClassId>> {
        let start_list = self.resolve(request)?;

        if let Some(id) = start_list.iter().find(|id| self.is_started(**id)) {
            let name = self.classes.get(id).map(|c| c.name.clone()).unwrap_or_default();
            return Err(RaceError::AlreadyStarted { id: *id, name });
        }

        for id in &start_list {
            if let Some(class) = self.classes.get_mut(id) {
                class.started_at = Some(timestamp);
            }
        }

        log::info!("Started classes {:?} at {}", start_list, timestamp);
        Ok(start_list)
    }

    fn resolve(&self, request: &[&str]) -> Result<Vec<ClassId>> {
        let invalid = |reason: &str| RaceError::InvalidStart {
            directive: request.join(" "),
            reason: reason.to_string(),
        };

        if request.is_empty() {
            return Err(invalid("Need to specify which classes to start"));
        }

        if request.contains(&START_ALL) {
            if request.len() > 1 {
                return Err(invalid("\"all\" can not be used with any other class"));
            }
            return Ok(self.classes.keys().copied().collect());
        }

        let mut ids = BTreeSet::new();
        for text in request {
            if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("Class id must be an integer or \"all\""));
            }
            let id: ClassId = text
                .parse()
                .map_err(|_| invalid("Class id must be an integer or \"all\""))?;
            if !self.classes.contains_key(&id) {
                return Err(invalid(&format!("No class with id {}", id)));
            }
            ids.insert(id);
        }
        Ok(ids.into_iter().collect())
    }

    pub fn is_started(&self, class_id: ClassId) -> bool {
        self.start_time(class_id).is_some()
    }

    pub fn start_time(&self, class_id: ClassId) -> Option<Timestamp> {
        self.classes.get(&class_id).and_then(|c| c.started_at)
    }

    /// Classes that have started, with their start times
    pub fn started(&self) -> Vec<(ClassId, Timestamp)> {
        self.classes
            .iter()
            .filter_map(|(id, c)| c.started_at.map(|t| (*id, t)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemoryDiagnostics;
    use crate::race::{Class, Person, Team};

    const SOLO: ClassId = 1;
    const TEAM: ClassId = 2;

    fn config() -> RaceConfig {
        let mut persons = Vec::new();
        let mut teams = Vec::new();
        for bib in 11..15 {
            persons.push(Person::new(bib, format!("Solo {}", bib)));
            teams.push(Team::new(SOLO, format!("Solo {}", bib), &[bib]).unwrap());
        }
        for first in [21, 31, 41] {
            persons.push(Person::new(first, format!("Member {}", first)));
            persons.push(Person::new(first + 1, format!("Member {}", first + 1)));
            teams.push(Team::new(TEAM, format!("Team {}", first), &[first, first + 1]).unwrap());
        }
        RaceConfig::new(
            vec![Class::new(SOLO, 1, "Solo"), Class::new(TEAM, 2, "Team")],
            persons,
            teams,
        )
        .unwrap()
    }

    fn clock() -> (StartClock, Arc<MemoryDiagnostics>) {
        let diagnostics = Arc::new(MemoryDiagnostics::new());
        (StartClock::new(&config(), diagnostics.clone()), diagnostics)
    }

    #[test]
    fn test_not_started_before_start() {
        let (clock, _) = clock();
        assert!(!clock.is_started(SOLO));
        assert!(!clock.is_started(TEAM));
        assert_eq!(clock.start_time(SOLO), None);
    }

    #[test]
    fn test_start_only_one_class() {
        let (mut clock, _) = clock();
        assert!(clock.start_classes(&["1"], 11.0));
        assert!(clock.is_started(SOLO));
        assert!(!clock.is_started(TEAM));
        assert_eq!(clock.start_time(SOLO), Some(11.0));
    }

    #[test]
    fn test_start_class_list() {
        let (mut clock, _) = clock();
        assert!(clock.start_classes(&["2", "1"], 22.0));
        assert_eq!(clock.start_time(SOLO), Some(22.0));
        assert_eq!(clock.start_time(TEAM), Some(22.0));
    }

    #[test]
    fn test_start_all() {
        let (mut clock, _) = clock();
        assert_eq!(clock.try_start_classes(&["all"], 33.0).unwrap(), vec![SOLO, TEAM]);
        assert_eq!(clock.started(), vec![(SOLO, 33.0), (TEAM, 33.0)]);
    }

    #[test]
    fn test_start_none_fails() {
        let (mut clock, diagnostics) = clock();
        assert!(!clock.start_classes(&[], 0.0));
        assert!(!clock.start_classes(&[""], 0.0));
        assert_eq!(diagnostics.errors().len(), 2);
    }

    #[test]
    fn test_can_not_start_class_twice() {
        let (mut clock, diagnostics) = clock();
        assert!(clock.start_classes(&["1"], 33.0));
        assert!(!clock.start_classes(&["1"], 44.0));
        assert_eq!(clock.start_time(SOLO), Some(33.0));
        assert!(diagnostics.errors()[0].contains("already started"));
    }

    #[test]
    fn test_all_must_be_single_argument() {
        let (mut clock, _) = clock();
        assert!(!clock.start_classes(&["1", "all"], 33.0));
        assert!(!clock.is_started(SOLO));
        assert!(!clock.is_started(TEAM));
    }

    #[test]
    fn test_partial_conflict_starts_nothing() {
        let (mut clock, _) = clock();
        assert!(clock.start_classes(&["1"], 10.0));
        let err = clock.try_start_classes(&["2", "1"], 20.0).unwrap_err();
        assert!(matches!(err, RaceError::AlreadyStarted { id: SOLO, .. }));
        assert!(!clock.is_started(TEAM));
        assert_eq!(clock.start_time(SOLO), Some(10.0));
    }

    #[test]
    fn test_unknown_class_rejected() {
        let (mut clock, _) = clock();
        let err = clock.try_start_classes(&["1", "9"], 5.0).unwrap_err();
        assert_eq!(err.kind(), crate::types::ErrorKind::Validation);
        assert!(!clock.is_started(SOLO));
    }

    #[test]
    fn test_reset() {
        let (mut clock, _) = clock();
        assert!(clock.start_classes(&["all"], 1.0));
        clock.reset();
        assert!(!clock.is_started(SOLO));
        assert!(clock.start_classes(&["all"], 2.0));
    }
}
