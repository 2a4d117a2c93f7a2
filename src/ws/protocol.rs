//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::{GameStateSnapshot, Side};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Request a side on the board
    Join {
        /// Client-chosen id echoed back in `joined`
        #[serde(rename = "playerId", default)]
        player_id: Option<String>,
    },

    /// Move own paddle one step ("up", "down", "left" or "right")
    MovePaddle { direction: String },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Join accepted
    Joined {
        #[serde(rename = "playerId")]
        player_id: String,
        side: Side,
    },

    /// Free-form notice, e.g. a rejected join
    Message { message: String },

    /// Broadcast after every tick and every state change
    GameState(GameStateSnapshot),
}

impl ServerMsg {
    pub fn game_full() -> Self {
        Self::Message {
            message: "Game is full".to_string(),
        }
    }
}
