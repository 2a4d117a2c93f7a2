//! Player slots and paddle movement

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::physics::Board;
use super::{ConnectionId, GameError};

/// Distance a paddle travels per move
pub const PADDLE_STEP: f64 = 10.0;
/// Paddle extent along its edge
pub const PADDLE_LENGTH: f64 = 200.0;
/// Paddle extent into the board
pub const PADDLE_THICKNESS: f64 = 10.0;

/// Board edge a paddle is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    /// Assignment order for joining players
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Top, Side::Bottom];

    /// Left and right paddles travel up and down
    pub fn is_vertical(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Top => "top",
            Side::Bottom => "bottom",
        };
        f.write_str(name)
    }
}

/// Movement intent sent by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl FromStr for Direction {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(GameError::InvalidDirection(other.to_string())),
        }
    }
}

/// Axis-aligned paddle rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// An occupied side of the board
#[derive(Debug, Clone)]
pub struct Player {
    pub id: ConnectionId,
    pub side: Side,
    pub paddle: Paddle,
    pub score: u32,
    /// Last direction that actually moved the paddle
    pub direction: Option<Direction>,
}

impl Player {
    pub fn new(id: ConnectionId, side: Side, board: &Board) -> Self {
        let mut player = Self {
            id,
            side,
            paddle: Paddle {
                x: 0.0,
                y: 0.0,
                width: 0.0,
                height: 0.0,
            },
            score: 0,
            direction: None,
        };
        player.set_paddle_position(board);
        player
    }

    /// Put the paddle back in the middle of its edge
    pub fn set_paddle_position(&mut self, board: &Board) {
        let (width, height) = if self.side.is_vertical() {
            (PADDLE_THICKNESS, PADDLE_LENGTH)
        } else {
            (PADDLE_LENGTH, PADDLE_THICKNESS)
        };

        let (x, y) = match self.side {
            Side::Left => (0.0, board.height() / 2.0 - height / 2.0),
            Side::Right => (board.width() - width, board.height() / 2.0 - height / 2.0),
            Side::Top => (board.width() / 2.0 - width / 2.0, 0.0),
            Side::Bottom => (board.width() / 2.0 - width / 2.0, board.height() - height),
        };

        self.paddle = Paddle {
            x,
            y,
            width,
            height,
        };
    }

    /// Step the paddle along its edge. Returns whether it moved.
    ///
    /// Directions across the paddle's axis are ignored, and a step that would
    /// leave the board is dropped rather than shortened.
    pub fn move_paddle(&mut self, direction: Direction, board: &Board) -> bool {
        let paddle = &mut self.paddle;
        let (height, width) = (paddle.height, paddle.width);

        let moved = match (self.side.is_vertical(), direction) {
            (true, Direction::Up) => step_within(&mut paddle.y, -PADDLE_STEP, height, board.height()),
            (true, Direction::Down) => step_within(&mut paddle.y, PADDLE_STEP, height, board.height()),
            (false, Direction::Left) => step_within(&mut paddle.x, -PADDLE_STEP, width, board.width()),
            (false, Direction::Right) => step_within(&mut paddle.x, PADDLE_STEP, width, board.width()),
            _ => false,
        };

        if moved {
            self.direction = Some(direction);
        }
        moved
    }
}

fn step_within(position: &mut f64, delta: f64, extent: f64, limit: f64) -> bool {
    let next = *position + delta;
    if next < 0.0 || next + extent > limit {
        return false;
    }
    *position = next;
    true
}
