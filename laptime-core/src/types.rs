//! Core types for the lap timing library
//!
//! This module defines the identifiers, the event record that makes up the
//! race log, and the error taxonomy shared by every component.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Timestamp type used throughout the library: Unix time in seconds
pub type Timestamp = f64;

/// Race number carried by a participant
pub type Bib = u32;

/// Competition class identifier
pub type ClassId = u32;

/// Team identifier (the lowest bib among the team's members)
pub type TeamId = u32;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, RaceError>;

/// Broad error categories used to decide how a failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: bad line, timestamp, bib or start directive
    Validation,
    /// Input is well formed but conflicts with the current race state
    StateConflict,
    /// The log file lock could not be obtained in time
    LockContention,
    /// Filesystem or socket failure
    Io,
    /// Static race configuration is inconsistent
    Config,
}

/// Errors that can occur while timing a race
#[derive(Debug, thiserror::Error)]
pub enum RaceError {
    #[error("Invalid timestamp: '{0}'")]
    InvalidTimestamp(String),

    #[error("Could not interpret log line: '{0}'")]
    MalformedLine(String),

    #[error("Unknown bib {0}")]
    UnknownBib(Bib),

    #[error("Invalid start directive '{directive}': {reason}")]
    InvalidStart { directive: String, reason: String },

    #[error("Class {id}, \"{name}\" has already started")]
    AlreadyStarted { id: ClassId, name: String },

    #[error("Class {0} has not yet started")]
    NotStarted(ClassId),

    #[error("Lap for bib {bib} at {timestamp} is earlier than {previous}")]
    OutOfOrder {
        bib: Bib,
        timestamp: Timestamp,
        previous: Timestamp,
    },

    #[error("Index {index} out of range (log has {len} events)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{}:{line}: {reason}", path.display())]
    LogParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Invalid race configuration: {0}")]
    InvalidConfig(String),

    #[error("Lock on {} was held for longer than {waited_ms} ms", path.display())]
    LockContention { path: PathBuf, waited_ms: u128 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl RaceError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RaceError::InvalidTimestamp(_)
            | RaceError::MalformedLine(_)
            | RaceError::UnknownBib(_)
            | RaceError::InvalidStart { .. }
            | RaceError::IndexOutOfRange { .. }
            | RaceError::LogParse { .. } => ErrorKind::Validation,
            RaceError::AlreadyStarted { .. }
            | RaceError::NotStarted(_)
            | RaceError::OutOfOrder { .. } => ErrorKind::StateConflict,
            RaceError::LockContention { .. } => ErrorKind::LockContention,
            RaceError::IoError(_) => ErrorKind::Io,
            RaceError::InvalidConfig(_) | RaceError::TomlError(_) => ErrorKind::Config,
        }
    }
}

/// One entry of the race log: when it happened and what happened
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub timestamp: Timestamp,
    pub text: String,
}

/// Interpretation of an event's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind<'a> {
    /// Nothing recorded (tolerated, but worth a warning)
    Blank,
    /// `start` followed by class ids or `all`
    Start(Vec<&'a str>),
    /// A bib crossing the line
    Lap(Bib),
    /// Anything else
    Unknown,
}

impl Event {
    /// Create a new event
    pub fn new(timestamp: Timestamp, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }

    /// Parse a `timestamp,eventText` line (trailing newline allowed)
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (time_text, text) = line
            .split_once(',')
            .ok_or_else(|| RaceError::MalformedLine(line.to_string()))?;
        let timestamp = parse_timestamp(time_text)?;
        Ok(Self::new(timestamp, text))
    }

    /// Classify the event text
    pub fn kind(&self) -> EventKind<'_> {
        classify(&self.text)
    }

    /// True if this is a start directive
    pub fn is_start(&self) -> bool {
        is_start_text(&self.text)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.timestamp, self.text)
    }
}

impl FromStr for Event {
    type Err = RaceError;

    fn from_str(s: &str) -> Result<Self> {
        Event::parse(s)
    }
}

/// Parse a decimal Unix timestamp
pub fn parse_timestamp(text: &str) -> Result<Timestamp> {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(RaceError::InvalidTimestamp(text.to_string())),
    }
}

pub(crate) fn is_start_text(text: &str) -> bool {
    text.starts_with("start")
}

pub(crate) fn classify(text: &str) -> EventKind<'_> {
    if text.is_empty() {
        EventKind::Blank
    } else if let Some(rest) = text.strip_prefix("start") {
        EventKind::Start(rest.split(' ').filter(|s| !s.is_empty()).collect())
    } else if text.bytes().all(|b| b.is_ascii_digit()) {
        match text.parse::<Bib>() {
            Ok(bib) => EventKind::Lap(bib),
            Err(_) => EventKind::Unknown,
        }
    } else {
        EventKind::Unknown
    }
}

/// Convert a log timestamp to a wall-clock time
pub fn wall_clock(timestamp: Timestamp) -> Option<DateTime<Utc>> {
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}

/// Current time as a log timestamp
pub fn now_timestamp() -> Timestamp {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_millis()) / 1000.0
}
