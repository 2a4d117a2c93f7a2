//! Game simulation modules

pub mod physics;
pub mod player;
pub mod simulation;
pub mod snapshot;

use std::time::Duration;

pub use physics::{Ball, Board};
pub use player::{Paddle, Side};
pub use simulation::{Simulation, TickOutcome};
pub use snapshot::GameStateSnapshot;

/// Opaque connection identifier assigned by the transport
pub type ConnectionId = String;

/// Maximum number of players, one per board side
pub const MAX_PLAYERS: usize = 4;

/// Players needed before the ball is put in play
pub const MIN_PLAYERS: usize = 2;

/// Settings for the shared game, captured once at startup
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub width: u32,
    pub height: u32,
    /// Pause after the ball leaves through the left or right edge
    pub restart_delay: Duration,
    /// Serve the first ball from `random_ball_position` instead of the centre
    pub random_serve: bool,
}

impl GameConfig {
    pub fn board(&self) -> Board {
        Board::new(self.width, self.height)
    }
}

/// Errors raised by simulation operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Game is full")]
    GameFull,

    #[error("Unrecognized direction: {0}")]
    InvalidDirection(String),

    #[error("No player joined with connection {0}")]
    UnknownPlayer(ConnectionId),
}
