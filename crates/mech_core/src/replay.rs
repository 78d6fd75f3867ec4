//! Replay files and playback.
//!
//! A replay is the complete event log of a game plus the hash of the state it
//! derives to. Because every roll is already baked into the events, playback
//! never needs the dice: it only folds events. Any prefix of the log can be
//! shown, which is how a viewer scrubs back and forth.
//!
//! State hashes are stable within one build, so `final_hash` is only
//! meaningful to the build that wrote it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::event_log::EventLog;
use crate::events::GameEvent;
use crate::reducer::apply_event_in_place;
use crate::state::GameState;

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Complete replay data structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Game identifier.
    pub game_id: String,
    /// Seed of the authoritative roller, when it was seeded.
    pub seed: Option<u64>,
    /// Every event in log order.
    pub events: Vec<GameEvent>,
    /// Hash of the state the full log derives to.
    pub final_hash: u64,
}

impl Replay {
    /// Capture a finished (or in-progress) game.
    #[must_use]
    pub fn from_log(log: &EventLog, seed: Option<u64>) -> Self {
        Self {
            version: REPLAY_VERSION,
            game_id: log.game_id().unwrap_or_default().to_string(),
            seed,
            events: log.events().to_vec(),
            final_hash: log.derive_state().state_hash(),
        }
    }

    /// Rebuild a checked event log.
    ///
    /// # Errors
    /// Returns an error if the events are out of order or mixed games.
    pub fn to_log(&self) -> Result<EventLog> {
        EventLog::from_events(self.events.clone())
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| GameError::Serialization(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or deserialization fails, or if the
    /// file was written by another format version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let replay: Self = serde_json::from_slice(&bytes).map_err(|e| GameError::DataParseError {
            source_name: path.as_ref().display().to_string(),
            message: e.to_string(),
        })?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::ReplayVersionMismatch {
                expected: REPLAY_VERSION,
                found: replay.version,
            });
        }

        Ok(replay)
    }

    /// Events that happened during `turn`.
    #[must_use]
    pub fn events_in_turn(&self, turn: u32) -> Vec<&GameEvent> {
        self.events.iter().filter(|event| event.turn == turn).collect()
    }

    /// Last turn reached.
    #[must_use]
    pub fn final_turn(&self) -> u32 {
        self.events.last().map_or(0, |event| event.turn)
    }

    /// Total number of events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    /// The replay being played.
    replay: Replay,
    /// State after the events played so far.
    state: GameState,
    /// Number of events applied.
    position: usize,
}

impl ReplayPlayer {
    /// Create a player positioned before the first event.
    #[must_use]
    pub fn new(replay: Replay) -> Self {
        Self {
            replay,
            state: GameState::default(),
            position: 0,
        }
    }

    /// Apply the next event.
    ///
    /// Returns true if there are more events to play.
    pub fn advance(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        let event = &self.replay.events[self.position];
        apply_event_in_place(&mut self.state, event);
        self.position += 1;
        !self.is_finished()
    }

    /// Play through the end of `turn`.
    pub fn advance_to_turn_end(&mut self, turn: u32) {
        while let Some(event) = self.replay.events.get(self.position) {
            if event.turn > turn {
                break;
            }
            apply_event_in_place(&mut self.state, event);
            self.position += 1;
        }
    }

    /// Show the state after the first `position` events.
    pub fn seek(&mut self, position: usize) {
        let target = position.min(self.replay.events.len());
        if target < self.position {
            self.state = GameState::default();
            self.position = 0;
        }
        while self.position < target {
            apply_event_in_place(&mut self.state, &self.replay.events[self.position]);
            self.position += 1;
        }
    }

    /// Number of events applied.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Event applied most recently.
    #[must_use]
    pub fn current_event(&self) -> Option<&GameEvent> {
        self.position
            .checked_sub(1)
            .and_then(|index| self.replay.events.get(index))
    }

    /// Get a reference to the current state.
    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    /// Get the replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Check if the replay has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.position >= self.replay.events.len()
    }

    /// Verify the replay produces the expected final hash.
    ///
    /// # Errors
    /// Returns an error if the events do not form a valid log.
    pub fn verify(&mut self) -> Result<bool> {
        self.replay.to_log()?;
        self.seek(self.replay.events.len());
        let actual_hash = self.state.state_hash();
        if actual_hash != self.replay.final_hash {
            tracing::warn!(
                expected = self.replay.final_hash,
                actual = actual_hash,
                "replay final hash mismatch"
            );
        }
        Ok(actual_hash == self.replay.final_hash)
    }

    /// Get progress as a percentage (0-100).
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.replay.events.is_empty() {
            100.0
        } else {
            (self.position as f64 / self.replay.events.len() as f64) * 100.0
        }
    }
}
