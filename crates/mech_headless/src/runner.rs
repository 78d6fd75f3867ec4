//! Headless game runner implementation.
//!
//! Wraps a [`GameSession`] and answers protocol commands one line at a
//! time. Input and output are generic so tests drive it from in-memory
//! buffers and the binary from stdin/stdout.

use std::io::{self, BufRead, Write};

use mech_core::dice::DiceRoller;
use mech_core::legality::valid_destinations_for;
use mech_core::replay::Replay;
use mech_core::session::{Clock, GameSession};
use mech_core::summary::BattleSummary;

use crate::protocol::{Command, Response, StateView};
use crate::strategies::Autopilot;

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Dice seed, recorded in saved replays.
    pub seed: Option<u64>,
    /// Strategies used by the `auto` command.
    pub autopilot: Autopilot,
}

/// Headless runner for externally controlled games.
pub struct HeadlessRunner<R: DiceRoller, C: Clock> {
    session: GameSession<R, C>,
    config: HeadlessConfig,
    game_over_sent: bool,
}

impl<R: DiceRoller, C: Clock> HeadlessRunner<R, C> {
    /// Create a runner around a started session.
    pub fn new(session: GameSession<R, C>, config: HeadlessConfig) -> Self {
        Self {
            session,
            config,
            game_over_sent: false,
        }
    }

    /// The wrapped session.
    pub const fn session(&self) -> &GameSession<R, C> {
        &self.session
    }

    /// Give the session back.
    pub fn into_session(self) -> GameSession<R, C> {
        self.session
    }

    /// Greeting sent before the first command.
    pub fn ready(&self) -> Response {
        Response::ready(self.session.state(), self.session.events().len())
    }

    /// Handle one command. The flag is true when the runner should stop.
    pub fn handle(&mut self, command: Command) -> (Vec<Response>, bool) {
        let name = command.name();
        let mut responses = Vec::new();
        let mut quit = false;

        match command {
            Command::Submit { action } => match self.session.submit(action) {
                Ok(events) => responses.push(Response::Events {
                    events,
                    hash: self.session.state().state_hash(),
                }),
                Err(error) => {
                    tracing::warn!(reason = %error, "action rejected");
                    responses.push(Response::rejected(name, error));
                }
            },
            Command::Auto { count } => {
                let mut events = Vec::new();
                for _ in 0..count {
                    let Some(action) = self.config.autopilot.next_action(self.session.state()) else {
                        break;
                    };
                    match self.session.submit(action) {
                        Ok(appended) => events.extend(appended),
                        Err(error) => {
                            tracing::error!(reason = %error, "autopilot chose an illegal action");
                            responses.push(Response::rejected(name, error));
                            break;
                        }
                    }
                }
                responses.insert(
                    0,
                    Response::Events {
                        events,
                        hash: self.session.state().state_hash(),
                    },
                );
            }
            Command::Query => responses.push(Response::State {
                state: StateView::of(self.session.state()),
            }),
            Command::Legal { side } => {
                let state = self.session.state();
                let awaiting_movement = if state.active_side() == Some(side) {
                    state.units_awaiting_movement(side)
                } else {
                    Vec::new()
                };
                responses.push(Response::Legal {
                    side,
                    awaiting_movement,
                    attacks: self.session.legal_attacks(side),
                });
            }
            Command::Destinations { unit, movement } => {
                if self.session.state().unit(unit).is_some() {
                    responses.push(Response::Destinations {
                        unit,
                        hexes: valid_destinations_for(self.session.state(), unit, movement)
                            .into_iter()
                            .collect(),
                    });
                } else {
                    responses.push(Response::error(format!("no unit {unit}"), Some(name)));
                }
            }
            Command::Events { from } => responses.push(Response::Events {
                events: self.session.events().iter().skip(from).cloned().collect(),
                hash: self.session.state().state_hash(),
            }),
            Command::Hash => responses.push(Response::StateHash {
                events: self.session.events().len(),
                hash: self.session.state().state_hash(),
            }),
            Command::Summary => responses.push(Response::Summary {
                summary: BattleSummary::from_events(self.session.events()),
            }),
            Command::Save { path } => {
                let replay = Replay::from_log(self.session.log(), self.config.seed);
                match replay.save(&path) {
                    Ok(()) => responses.push(Response::Saved {
                        path,
                        events: replay.event_count(),
                    }),
                    Err(e) => responses.push(Response::error(e.to_string(), Some(name))),
                }
            }
            Command::Quit => {
                responses.push(Response::Bye);
                quit = true;
            }
        }

        if !self.game_over_sent && !quit {
            if let Some(over) = Response::game_over(self.session.state()) {
                tracing::info!("game over");
                self.game_over_sent = true;
                responses.push(over);
            }
        }
        (responses, quit)
    }

    /// Process JSON-line commands until `quit` or end of input.
    ///
    /// Blank lines are skipped; malformed lines answer with an error and
    /// the loop continues.
    pub fn run<I: BufRead, O: Write>(&mut self, input: I, mut output: O) -> io::Result<()> {
        output.write_all(self.ready().to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let (responses, quit) = match Command::from_json(trimmed) {
                Ok(command) => {
                    tracing::debug!(cmd = command.name(), "command");
                    self.handle(command)
                }
                Err(e) => (vec![Response::error(format!("Invalid command: {e}"), None)], false),
            };
            for response in responses {
                output.write_all(response.to_json_line().as_bytes())?;
            }
            output.flush()?;
            if quit {
                break;
            }
        }
        Ok(())
    }
}
