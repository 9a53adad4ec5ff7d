//! One race opened for timing or reporting
//!
//! Bundles the race configuration, the shared log file and the diagnostics
//! sink, and implements the log-changing commands on top of them.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use laptime_core::{
    load_race_file, now_timestamp, Bib, ClassId, Diagnostics, Event, EventKind, EventLog,
    LogFile, RaceConfig, RankingEngine, StartClock, Timestamp, UdpNotifier,
};
use std::sync::Arc;

pub struct Session {
    config: Arc<RaceConfig>,
    log_file: LogFile,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Session {
    /// Load the race description and prepare the log file
    pub fn open(app: &AppConfig, diagnostics: Arc<dyn Diagnostics>) -> Result<Self> {
        let config = load_race_file(&app.files.race)
            .with_context(|| format!("Failed to load race file: {:?}", app.files.race))?;

        let mut log_file = LogFile::new(&app.files.log, diagnostics.clone())
            .with_lock_policy(app.lock.policy());
        if app.notify.enabled {
            match UdpNotifier::new(app.notify.address.as_str()) {
                Ok(notifier) => log_file = log_file.with_notifier(Box::new(notifier)),
                Err(e) => log::warn!(
                    "Change notifications to {} disabled: {}",
                    app.notify.address,
                    e
                ),
            }
        }

        Ok(Self::with_parts(Arc::new(config), log_file, diagnostics))
    }

    pub fn with_parts(
        config: Arc<RaceConfig>,
        log_file: LogFile,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            config,
            log_file,
            diagnostics,
        }
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn load(&self) -> Result<EventLog> {
        self.log_file
            .load()
            .with_context(|| format!("Failed to load log file: {:?}", self.log_file.path()))
    }

    /// Replay the whole log into a fresh engine
    ///
    /// Returns the engine and the number of rejected lines.
    pub fn replay(&self) -> Result<(RankingEngine, usize)> {
        let log = self.load()?;
        let mut engine = RankingEngine::new(self.config.clone(), self.diagnostics.clone());
        let rejected = engine.replay(&log);
        log::debug!("Replayed {} events, {} rejected", log.len(), rejected);
        Ok((engine, rejected))
    }

    /// Append a passage for `bib` at the current time
    pub fn record(&mut self, bib: Bib) -> Result<Event> {
        self.record_at(bib, now_timestamp())
    }

    pub fn record_at(&mut self, bib: Bib, timestamp: Timestamp) -> Result<Event> {
        if self.config.team_id_by_bib(bib).is_none() {
            log::warn!("Bib {} is not registered; recording it anyway", bib);
        }
        let event = Event::new(timestamp, bib.to_string());
        let appended = event.clone();
        self.log_file
            .modify(move |log| {
                log.push(appended);
                Ok(())
            })
            .context("Failed to record passage")?;
        Ok(event)
    }

    /// Append a start directive, if the classes can be started
    pub fn start(&mut self, classes: &[String]) -> Result<(Event, Vec<ClassId>)> {
        self.start_at(classes, now_timestamp())
    }

    pub fn start_at(
        &mut self,
        classes: &[String],
        timestamp: Timestamp,
    ) -> Result<(Event, Vec<ClassId>)> {
        let config = self.config.clone();
        let diagnostics = self.diagnostics.clone();
        let request: Vec<&str> = classes.iter().map(String::as_str).collect();
        let event = Event::new(timestamp, format!("start {}", request.join(" ")));

        let appended = event.clone();
        let started = self.log_file.modify(move |log| {
            let mut clock = StartClock::new(&config, diagnostics);
            for existing in log.iter() {
                if let EventKind::Start(ids) = existing.kind() {
                    clock.start_classes(&ids, existing.timestamp);
                }
            }
            let started = clock.try_start_classes(&request, timestamp)?;
            log.push(appended);
            Ok(started)
        })?;
        Ok((event, started))
    }

    /// Replace the text of event `index`, keeping its timestamp
    pub fn edit(&mut self, index: usize, text: &str) -> Result<Event> {
        let edited = self.log_file.modify(|log| {
            log.set(index, text)?;
            Ok(log.get(index).cloned())
        })?;
        edited.with_context(|| format!("No event at index {}", index))
    }
}
