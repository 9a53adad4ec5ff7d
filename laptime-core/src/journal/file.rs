//! Persisted race log
//!
//! Reads and rewrites the `timestamp,event` log file under the shared lock and
//! tells listeners when it has changed.
//!
//! ## File format
//! One event per line: `<unix timestamp>,<event text>`. The text is a bib
//! number or a start directive (`start 1 3`, `start all`).
//!
//! ## Failure handling
//! - Unparsable timestamp: the whole load fails, naming the line
//! - Empty event text: accepted, with a note
//! - Missing file: an empty log, with a note

use crate::diagnostics::Diagnostics;
use crate::journal::events::EventLog;
use crate::journal::lock::{LockPolicy, LogLock};
use crate::journal::notify::{ChangeNotifier, NullNotifier};
use crate::race::RaceConfig;
use crate::start::StartClock;
use crate::types::{parse_timestamp, Event, EventKind, RaceError, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The race log on disk
pub struct LogFile {
    path: PathBuf,
    policy: LockPolicy,
    notifier: Box<dyn ChangeNotifier>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl LogFile {
    /// Log file at `path` with the default lock policy and no notifications
    pub fn new(path: impl Into<PathBuf>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            path: path.into(),
            policy: LockPolicy::default(),
            notifier: Box::new(NullNotifier),
            diagnostics,
        }
    }

    /// Builder method: set the lock policy
    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builder method: set who is told about saves
    pub fn with_notifier(mut self, notifier: Box<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole log
    pub fn load(&self) -> Result<EventLog> {
        if !self.path.is_file() {
            self.diagnostics.note(&format!(
                "Could not load log file {}. Log is empty.",
                self.path.display()
            ));
            return Ok(EventLog::new());
        }

        let _lock = self.lock()?;
        self.read_unlocked()
    }

    /// Read the whole log and check its start directives
    ///
    /// Returns the log together with the start clock those directives
    /// produce. A start directive that can not be applied fails the load.
    pub fn load_validated(&self, config: &RaceConfig) -> Result<(EventLog, StartClock)> {
        let log = self.load()?;
        let mut clock = StartClock::new(config, self.diagnostics.clone());

        for (index, event) in log.iter().enumerate() {
            if let EventKind::Start(classes) = event.kind() {
                clock
                    .try_start_classes(&classes, event.timestamp)
                    .map_err(|e| RaceError::LogParse {
                        path: self.path.clone(),
                        line: index + 1,
                        reason: format!("Invalid start. {}", e),
                    })?;
            }
        }

        Ok((log, clock))
    }

    /// Rewrite the file from `log` and notify listeners
    pub fn save(&mut self, log: &EventLog) -> Result<()> {
        {
            let _lock = self.lock()?;
            self.write_unlocked(log)?;
        }
        self.notifier.log_changed();
        Ok(())
    }

    /// Load, change and save the log while holding the lock throughout
    pub fn modify<T, F>(&mut self, change: F) -> Result<T>
    where
        F: FnOnce(&mut EventLog) -> Result<T>,
    {
        let result = {
            let _lock = self.lock()?;
            let mut log = if self.path.is_file() {
                self.read_unlocked()?
            } else {
                EventLog::new()
            };
            let result = change(&mut log)?;
            self.write_unlocked(&log)?;
            result
        };
        self.notifier.log_changed();
        Ok(result)
    }

    fn lock(&self) -> Result<LogLock> {
        let lock = LogLock::acquire(&self.path, &self.policy)?;
        if lock.was_forced() {
            let contention = RaceError::LockContention {
                path: self.path.clone(),
                waited_ms: lock.waited().as_millis(),
            };
            self.diagnostics
                .note(&format!("{}; lock was taken over", contention));
        }
        Ok(lock)
    }

    fn read_unlocked(&self) -> Result<EventLog> {
        let content = fs::read_to_string(&self.path)?;
        let events = parse_log(&content, &self.path, self.diagnostics.as_ref())?;
        log::debug!("Loaded {} events from {:?}", events.len(), self.path);
        Ok(EventLog::from_events(events))
    }

    /// Write to a temporary sibling, then rename over the log
    fn write_unlocked(&self, log: &EventLog) -> Result<()> {
        let temp = temp_path(&self.path);
        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            for event in log {
                writeln!(writer, "{}", event)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        log::debug!("Saved {} events to {:?}", log.len(), self.path);
        Ok(())
    }
}

/// Parse log file content; `path` is only used in messages
pub fn parse_log(
    content: &str,
    path: &Path,
    diagnostics: &dyn Diagnostics,
) -> Result<Vec<Event>> {
    let mut events = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let row = index + 1;
        let line = line.trim_end_matches('\r');
        let (time_text, text) = line.split_once(',').ok_or_else(|| RaceError::LogParse {
            path: path.to_path_buf(),
            line: row,
            reason: "Missing ',' between timestamp and event".to_string(),
        })?;

        let timestamp = parse_timestamp(time_text).map_err(|_| RaceError::LogParse {
            path: path.to_path_buf(),
            line: row,
            reason: "Invalid timestamp.".to_string(),
        })?;

        if text.is_empty() {
            diagnostics.note(&format!("{}:{}: No event.", path.display(), row));
        }

        events.push(Event::new(timestamp, text));
    }

    Ok(events)
}

fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
