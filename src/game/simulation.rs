//! Authoritative game state and fixed-tick update

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::physics::{self, Ball, BallLaunch, Board};
use super::player::{Direction, Player, Side};
use super::snapshot::{BallPosition, GameStateSnapshot, PlayerView};
use super::{ConnectionId, GameConfig, GameError, MAX_PLAYERS, MIN_PLAYERS};

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Game not running, nothing changed
    Idle,
    /// Ball moved and stayed in play
    Advanced,
    /// Ball left through the left or right edge; the game stopped and a
    /// restart is pending until `finish_restart` runs
    BallOut,
}

/// The single shared game
pub struct Simulation {
    board: Board,
    /// Join order is kept; it decides the order paddle hits are applied in
    players: Vec<Player>,
    ball: Ball,
    started: bool,
    restart_pending: bool,
    rng: ChaCha8Rng,
}

impl Simulation {
    pub fn new(config: &GameConfig, seed: u64) -> Self {
        let board = config.board();
        let mut simulation = Self {
            board,
            players: Vec::with_capacity(MAX_PLAYERS),
            ball: Ball::served_from_center(&board),
            started: false,
            restart_pending: false,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };

        if config.random_serve {
            simulation.ball = simulation.random_ball_position().into();
        }
        simulation
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_restart_pending(&self) -> bool {
        self.restart_pending
    }

    /// Seat a new player on the first free side
    pub fn add_player(&mut self, id: ConnectionId) -> Result<&Player, GameError> {
        if let Some(index) = self.players.iter().position(|p| p.id == id) {
            debug!(conn_id = %id, "Player already joined");
            return Ok(&self.players[index]);
        }

        let side = Side::ALL
            .into_iter()
            .find(|side| self.players.iter().all(|p| p.side != *side))
            .ok_or(GameError::GameFull)?;

        self.players.push(Player::new(id, side, &self.board));

        info!(
            side = %side,
            player_count = self.players.len(),
            "Player joined"
        );

        if self.players.len() >= MIN_PLAYERS && !self.started && !self.restart_pending {
            self.start();
        }

        Ok(&self.players[self.players.len() - 1])
    }

    /// Remove a player if present. Unknown ids are ignored.
    pub fn remove_player(&mut self, id: &str) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        let player = self.players.remove(index);

        info!(
            side = %player.side,
            player_count = self.players.len(),
            "Player left"
        );

        if self.players.len() < MIN_PLAYERS {
            self.stop();
        }

        Some(player)
    }

    /// Apply a movement intent for a joined player. Returns whether the
    /// paddle moved.
    pub fn move_player(&mut self, id: &str, direction: &str) -> Result<bool, GameError> {
        let direction: Direction = direction.parse()?;
        let board = self.board;
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| GameError::UnknownPlayer(id.to_string()))?;

        Ok(player.move_paddle(direction, &board))
    }

    /// Advance the game by one fixed step
    pub fn tick(&mut self) -> TickOutcome {
        if !self.started {
            return TickOutcome::Idle;
        }

        let mut outcome = TickOutcome::Advanced;
        self.ball.advance();

        if self.ball.hits_horizontal_wall(&self.board) {
            self.ball.dy = -self.ball.dy + physics::perturbation(&mut self.rng);
        }

        if self.ball.is_out(&self.board) {
            self.stop();
            self.restart_pending = true;
            outcome = TickOutcome::BallOut;
            info!(x = self.ball.x, y = self.ball.y, "Ball out of play, restart pending");
        }

        for player in &self.players {
            if physics::paddle_contains(&player.paddle, self.ball.x, self.ball.y) {
                self.ball.dx = -self.ball.dx + physics::perturbation(&mut self.rng);
                self.ball.dy += physics::perturbation(&mut self.rng);
                debug!(side = %player.side, "Paddle hit");
            }
        }

        outcome
    }

    /// Serve from the centre and reset every paddle. Does not touch the
    /// run flag.
    pub fn restart(&mut self) {
        self.ball = Ball::served_from_center(&self.board);
        for player in &mut self.players {
            player.set_paddle_position(&self.board);
        }
        info!("Game restarting");
    }

    /// Complete a pending restart once its delay has elapsed. Player count
    /// is checked again here: with fewer than two players the board is
    /// reset but the game stays stopped. Returns whether the game resumed.
    pub fn finish_restart(&mut self) -> bool {
        if !self.restart_pending {
            return false;
        }
        self.restart_pending = false;
        self.restart();

        if self.players.len() >= MIN_PLAYERS {
            self.start();
        } else {
            info!(
                player_count = self.players.len(),
                "Not enough players to resume after restart"
            );
        }
        self.started
    }

    pub fn game_state(&self) -> GameStateSnapshot {
        GameStateSnapshot {
            players: self.players.iter().map(PlayerView::from).collect(),
            ball: BallPosition {
                x: self.ball.x,
                y: self.ball.y,
            },
            game_started: self.started,
        }
    }

    /// Candidate serve near the centre with a random heading
    pub fn random_ball_position(&mut self) -> BallLaunch {
        physics::random_launch(&self.board, &mut self.rng)
    }

    fn start(&mut self) {
        if !self.started {
            self.started = true;
            info!("Game started");
        }
    }

    fn stop(&mut self) {
        if self.started {
            self.started = false;
            info!("Game stopped");
        }
    }

    #[cfg(test)]
    pub(crate) fn place_ball(&mut self, ball: Ball) {
        self.ball = ball;
    }
}
