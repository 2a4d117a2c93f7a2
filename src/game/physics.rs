//! Ball physics and collision primitives

use rand::Rng;

use super::player::Paddle;

/// Serve velocity on both axes after a restart
pub const SERVE_VELOCITY: f64 = 2.0;

/// Bound of the uniform noise added on every bounce
pub const BOUNCE_JITTER: f64 = 0.25;

/// Half-width of the square around the centre used for random serves
pub const RANDOM_SERVE_SPREAD: f64 = 50.0;

/// Immutable playing field dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    pub width: u32,
    pub height: u32,
}

impl Board {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn width(&self) -> f64 {
        self.width as f64
    }

    pub fn height(&self) -> f64 {
        self.height as f64
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width() / 2.0, self.height() / 2.0)
    }
}

/// Ball position and per-tick velocity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Ball {
    /// Ball at the board centre with the fixed serve velocity
    pub fn served_from_center(board: &Board) -> Self {
        let (x, y) = board.center();
        Self {
            x,
            y,
            dx: SERVE_VELOCITY,
            dy: SERVE_VELOCITY,
        }
    }

    pub fn advance(&mut self) {
        self.x += self.dx;
        self.y += self.dy;
    }

    pub fn hits_horizontal_wall(&self, board: &Board) -> bool {
        self.y <= 0.0 || self.y >= board.height()
    }

    /// Left or right edge, where the ball goes out of play
    pub fn is_out(&self, board: &Board) -> bool {
        self.x <= 0.0 || self.x >= board.width()
    }
}

impl From<BallLaunch> for Ball {
    fn from(launch: BallLaunch) -> Self {
        Self {
            x: launch.x,
            y: launch.y,
            dx: launch.dx,
            dy: launch.dy,
        }
    }
}

/// Candidate serve produced by `random_launch`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallLaunch {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub speed: f64,
}

/// Uniform noise in [-BOUNCE_JITTER, BOUNCE_JITTER]
pub fn perturbation<R: Rng>(rng: &mut R) -> f64 {
    rng.gen_range(-BOUNCE_JITTER..=BOUNCE_JITTER)
}

/// Closed point-in-rectangle test
pub fn paddle_contains(paddle: &Paddle, x: f64, y: f64) -> bool {
    x >= paddle.x && x <= paddle.x + paddle.width && y >= paddle.y && y <= paddle.y + paddle.height
}

/// Random serve near the centre with a random heading and speed in [1, 2.5]
pub fn random_launch<R: Rng>(board: &Board, rng: &mut R) -> BallLaunch {
    let (center_x, center_y) = board.center();
    let x = center_x + rng.gen_range(-RANDOM_SERVE_SPREAD..RANDOM_SERVE_SPREAD);
    let y = center_y + rng.gen_range(-RANDOM_SERVE_SPREAD..RANDOM_SERVE_SPREAD);

    let sign_x = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    let sign_y = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    let speed = rng.gen_range(1.0..2.5);

    BallLaunch {
        x,
        y,
        dx: sign_x * SERVE_VELOCITY * speed,
        dy: sign_y * SERVE_VELOCITY * speed,
        speed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn serve_starts_at_center() {
        let ball = Ball::served_from_center(&Board::new(600, 400));
        assert_eq!(ball, Ball { x: 300.0, y: 200.0, dx: 2.0, dy: 2.0 });
    }

    #[test]
    fn wall_and_out_checks_are_inclusive() {
        let board = Board::new(600, 400);
        let mut ball = Ball::served_from_center(&board);

        ball.y = 0.0;
        assert!(ball.hits_horizontal_wall(&board));
        ball.y = 400.0;
        assert!(ball.hits_horizontal_wall(&board));
        ball.y = 399.9;
        assert!(!ball.hits_horizontal_wall(&board));

        ball.x = 0.0;
        assert!(ball.is_out(&board));
        ball.x = 605.0;
        assert!(ball.is_out(&board));
        ball.x = 0.1;
        assert!(!ball.is_out(&board));
    }

    #[test]
    fn paddle_edges_count_as_contact() {
        let paddle = Paddle {
            x: 590.0,
            y: 100.0,
            width: 10.0,
            height: 200.0,
        };

        assert!(paddle_contains(&paddle, 590.0, 100.0));
        assert!(paddle_contains(&paddle, 600.0, 300.0));
        assert!(!paddle_contains(&paddle, 589.9, 150.0));
        assert!(!paddle_contains(&paddle, 595.0, 300.1));
    }

    #[test]
    fn perturbation_stays_bounded() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..1_000 {
            let noise = perturbation(&mut rng);
            assert!(noise.abs() <= BOUNCE_JITTER);
        }
    }

    #[test]
    fn random_launch_stays_near_center() {
        let board = Board::new(600, 400);
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        for _ in 0..500 {
            let launch = random_launch(&board, &mut rng);
            assert!((launch.x - 300.0).abs() <= RANDOM_SERVE_SPREAD);
            assert!((launch.y - 200.0).abs() <= RANDOM_SERVE_SPREAD);
            assert!((1.0..=2.5).contains(&launch.speed));
            assert!((launch.dx.abs() - SERVE_VELOCITY * launch.speed).abs() < 1e-9);
            assert!((launch.dy.abs() - SERVE_VELOCITY * launch.speed).abs() < 1e-9);
        }
    }
}
