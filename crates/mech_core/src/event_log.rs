//! Append-only event log.
//!
//! The log is the single source of truth for a game. Event ids are the
//! position in the log, starting at zero with `GameCreated`. On disk a log is
//! JSON lines: one event per line, in order.

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::events::{GameEvent, GameEventType};
use crate::reducer::{apply_event_in_place, derive_state};
use crate::state::GameState;

/// Ordered events of one game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<GameEvent>,
}

impl EventLog {
    /// Empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Build a log from events, checking order and ownership.
    ///
    /// # Errors
    /// [`GameError::InvariantViolation`] if ids are not consecutive from
    /// zero, the first event is not `GameCreated`, or game ids differ.
    pub fn from_events(events: Vec<GameEvent>) -> Result<Self> {
        let mut log = Self::new();
        for event in events {
            log.append(event)?;
        }
        Ok(log)
    }

    /// Append one event after checking it continues the log.
    ///
    /// # Errors
    /// See [`EventLog::from_events`].
    pub fn append(&mut self, event: GameEvent) -> Result<()> {
        let expected = self.next_id();
        if event.id != expected {
            return Err(GameError::InvariantViolation(format!(
                "event id {} out of sequence, expected {expected}",
                event.id
            )));
        }
        match self.events.first() {
            None if event.event_type() != GameEventType::GameCreated => {
                return Err(GameError::InvariantViolation(
                    "log must start with GameCreated".to_string(),
                ));
            }
            Some(first) if first.game_id != event.game_id => {
                return Err(GameError::InvariantViolation(format!(
                    "event {} belongs to game '{}', not '{}'",
                    event.id, event.game_id, first.game_id
                )));
            }
            _ => {}
        }
        self.events.push(event);
        Ok(())
    }

    /// Append events produced by the session's own resolver.
    pub(crate) fn extend_trusted(&mut self, events: impl IntoIterator<Item = GameEvent>) {
        self.events.extend(events);
    }

    /// Id the next event will get.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.events.len() as u64
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events in order.
    #[must_use]
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Iterate over events in order.
    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }

    /// The first `len` events (all of them if `len` is larger).
    #[must_use]
    pub fn prefix(&self, len: usize) -> &[GameEvent] {
        &self.events[..len.min(self.events.len())]
    }

    /// Game id from the first event.
    #[must_use]
    pub fn game_id(&self) -> Option<&str> {
        self.events.first().map(|event| event.game_id.as_str())
    }

    /// Fold every event into a state.
    #[must_use]
    pub fn derive_state(&self) -> GameState {
        derive_state(&self.events)
    }

    /// Fold the first `len` events.
    #[must_use]
    pub fn derive_prefix(&self, len: usize) -> GameState {
        derive_state(self.prefix(len))
    }

    /// State hash after every prefix, index `i` covering events `0..=i`.
    #[must_use]
    pub fn prefix_hashes(&self) -> Vec<u64> {
        let mut state = GameState::default();
        self.events
            .iter()
            .map(|event| {
                apply_event_in_place(&mut state, event);
                state.state_hash()
            })
            .collect()
    }

    /// Encode as JSON lines.
    ///
    /// # Errors
    /// Returns an error if an event fails to serialize.
    pub fn to_json_lines(&self) -> Result<String> {
        let mut out = String::new();
        for event in &self.events {
            let line = serde_json::to_string(event).map_err(|e| GameError::Serialization(e.to_string()))?;
            let _ = writeln!(out, "{line}");
        }
        Ok(out)
    }

    /// Decode JSON lines, skipping blank lines.
    ///
    /// # Errors
    /// Returns an error naming the first bad line, or any ordering error
    /// from [`EventLog::from_events`].
    pub fn from_json_lines(text: &str) -> Result<Self> {
        let mut log = Self::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: GameEvent = serde_json::from_str(line).map_err(|e| GameError::DataParseError {
                source_name: format!("event log line {}", index + 1),
                message: e.to_string(),
            })?;
            log.append(event)?;
        }
        Ok(log)
    }

    /// Write the log to a file as JSON lines.
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json_lines()?)?;
        Ok(())
    }

    /// Read a JSON-lines log from a file.
    ///
    /// # Errors
    /// Returns an error if reading or decoding fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_lines(&text)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a GameEvent;
    type IntoIter = std::slice::Iter<'a, GameEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
