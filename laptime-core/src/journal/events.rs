//! In-memory race log
//!
//! The ordered sequence of events that the ranking engine replays. One event
//! per line of the persisted file.

use crate::types::{Event, RaceError, Result, Timestamp};
use std::fmt;

/// Ordered, append-only (apart from explicit corrections) list of events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    /// Append a new event at the end of the log
    pub fn append(&mut self, timestamp: Timestamp, text: impl Into<String>) {
        self.events.push(Event::new(timestamp, text));
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Replace the text of an existing event, keeping its timestamp
    pub fn set(&mut self, index: usize, text: impl Into<String>) -> Result<()> {
        let len = self.events.len();
        let event = self
            .events
            .get_mut(index)
            .ok_or(RaceError::IndexOutOfRange { index, len })?;
        log::info!(
            "Correcting event {} at {}: '{}'",
            index,
            event.timestamp,
            event.text
        );
        event.text = text.into();
        Ok(())
    }

    /// The last `count` events (fewer if the log is shorter)
    pub fn tail(&self, count: usize) -> EventLog {
        let start = self.events.len().saturating_sub(count);
        EventLog::from_events(self.events[start..].to_vec())
    }

    /// True if the event at `index` is a start directive
    pub fn is_start(&self, index: usize) -> bool {
        self.events.get(index).is_some_and(Event::is_start)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl fmt::Display for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for event in &self.events {
            writeln!(f, "{}", event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EventLog {
        let mut log = EventLog::new();
        log.append(100.0, "start all");
        log.append(160.0, "4");
        log.append(170.5, "3");
        log
    }

    #[test]
    fn test_tail() {
        let log = sample();
        let tail = log.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.get(0).unwrap().text, "4");
        assert_eq!(log.tail(10), log);
        assert!(log.tail(0).is_empty());
    }

    #[test]
    fn test_set_keeps_timestamp() {
        let mut log = sample();
        log.set(1, "5").unwrap();
        assert_eq!(log.get(1), Some(&Event::new(160.0, "5")));
    }

    #[test]
    fn test_set_out_of_range() {
        let mut log = sample();
        let err = log.set(3, "5").unwrap_err();
        assert!(matches!(err, RaceError::IndexOutOfRange { index: 3, len: 3 }));
        assert_eq!(log, sample());
    }

    #[test]
    fn test_is_start_and_display() {
        let log = sample();
        assert!(log.is_start(0));
        assert!(!log.is_start(1));
        assert!(!log.is_start(9));
        assert_eq!(log.to_string(), "100,start all\n160,4\n170.5,3\n");
    }
}
