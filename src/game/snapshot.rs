//! Read-only state payload broadcast to every connection

use serde::{Deserialize, Serialize};

use super::player::{Paddle, Player, Side};
use super::ConnectionId;

/// Player as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: ConnectionId,
    pub side: Side,
    pub paddle: Paddle,
    pub score: u32,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            side: player.side,
            paddle: player.paddle,
            score: player.score,
        }
    }
}

/// Ball position only; velocity stays on the server
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallPosition {
    pub x: f64,
    pub y: f64,
}

/// Full game snapshot, players in join order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    pub players: Vec<PlayerView>,
    pub ball: BallPosition,
    pub game_started: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Board;

    #[test]
    fn serializes_with_client_field_names() {
        let player = Player::new("conn-1".into(), Side::Left, &Board::new(600, 400));
        let snapshot = GameStateSnapshot {
            players: vec![PlayerView::from(&player)],
            ball: BallPosition { x: 300.0, y: 200.0 },
            game_started: false,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["gameStarted"], false);
        assert_eq!(json["ball"]["x"], 300.0);
        assert_eq!(json["players"][0]["id"], "conn-1");
        assert_eq!(json["players"][0]["side"], "left");
        assert_eq!(json["players"][0]["paddle"]["height"], 200.0);
        assert_eq!(json["players"][0]["score"], 0);
        assert!(json["ball"].get("dx").is_none());
    }
}
