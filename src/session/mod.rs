//! Session loop: drives the simulation clock and routes connection events

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::game::{ConnectionId, GameError, Simulation, TickOutcome};
use crate::util::time::tick_duration;
use crate::ws::protocol::ServerMsg;

/// Addressed delivery to a single connection
#[derive(Debug, Clone)]
pub enum Outbound {
    Send(ServerMsg),
    /// Close the socket once queued messages are flushed
    Close,
}

/// Inbound event from a connection
#[derive(Debug)]
pub enum SessionEvent {
    Join {
        conn_id: ConnectionId,
        /// Echoed in the acknowledgment, defaults to the connection id
        player_id: Option<String>,
        outbox: mpsc::Sender<Outbound>,
    },
    Move {
        conn_id: ConnectionId,
        direction: String,
    },
    Disconnect {
        conn_id: ConnectionId,
    },
}

/// Counters readable outside the session task
#[derive(Debug, Default)]
pub struct SessionStats {
    player_count: AtomicUsize,
    game_started: AtomicBool,
}

impl SessionStats {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn game_started(&self) -> bool {
        self.game_started.load(Ordering::Relaxed)
    }
}

/// Handle to the running session
#[derive(Clone)]
pub struct SessionHandle {
    pub events_tx: mpsc::Sender<SessionEvent>,
    pub state_tx: broadcast::Sender<ServerMsg>,
    pub stats: Arc<SessionStats>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.state_tx.subscribe()
    }
}

/// Owner of the shared simulation; every mutation runs on this task
pub struct Session {
    simulation: Simulation,
    events_rx: mpsc::Receiver<SessionEvent>,
    state_tx: broadcast::Sender<ServerMsg>,
    stats: Arc<SessionStats>,
    restart_delay: Duration,
    restart_at: Option<Instant>,
}

impl Session {
    pub fn new(simulation: Simulation, restart_delay: Duration) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::channel(256);
        let (state_tx, _) = broadcast::channel(64);
        let stats = Arc::new(SessionStats::default());

        let handle = SessionHandle {
            events_tx,
            state_tx: state_tx.clone(),
            stats: stats.clone(),
        };

        let session = Self {
            simulation,
            events_rx,
            state_tx,
            stats,
            restart_delay,
            restart_at: None,
        };

        (session, handle)
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!(
            width = self.simulation.board().width,
            height = self.simulation.board().height,
            "Session loop started"
        );

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let restart_at = self.restart_at;
            let restart_due = async move {
                match restart_at {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = tick_interval.tick() => self.on_tick(),
                _ = restart_due => self.on_restart_due(),
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }

        info!("Session loop stopped");
    }

    fn on_tick(&mut self) {
        if self.simulation.tick() == TickOutcome::BallOut && self.restart_at.is_none() {
            self.restart_at = Some(Instant::now() + self.restart_delay);
            debug!(delay_ms = self.restart_delay.as_millis() as u64, "Restart scheduled");
        }
        self.broadcast_state();
    }

    fn on_restart_due(&mut self) {
        self.restart_at = None;
        self.simulation.finish_restart();
        self.broadcast_state();
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Join {
                conn_id,
                player_id,
                outbox,
            } => self.handle_join(conn_id, player_id, outbox),
            SessionEvent::Move { conn_id, direction } => {
                match self.simulation.move_player(&conn_id, &direction) {
                    Ok(_) => {}
                    Err(GameError::UnknownPlayer(_)) => {
                        debug!(conn_id = %conn_id, "Move from connection without a side");
                        return;
                    }
                    Err(e) => {
                        debug!(conn_id = %conn_id, error = %e, "Ignoring move");
                    }
                }
                self.broadcast_state();
            }
            SessionEvent::Disconnect { conn_id } => {
                if self.simulation.remove_player(&conn_id).is_some() {
                    info!(conn_id = %conn_id, "Player disconnected");
                }
                self.broadcast_state();
            }
        }
    }

    fn handle_join(
        &mut self,
        conn_id: ConnectionId,
        player_id: Option<String>,
        outbox: mpsc::Sender<Outbound>,
    ) {
        let joined = self.simulation.add_player(conn_id.clone()).map(|p| p.side);
        match joined {
            Ok(side) => {
                let player_id = player_id.unwrap_or_else(|| conn_id.clone());
                info!(conn_id = %conn_id, player_id = %player_id, side = %side, "Player joined");

                deliver(&outbox, Outbound::Send(ServerMsg::Joined { player_id, side }));
                self.broadcast_state();
            }
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "Join rejected");
                deliver(&outbox, Outbound::Send(ServerMsg::game_full()));
                deliver(&outbox, Outbound::Close);
            }
        }
    }

    fn broadcast_state(&self) {
        self.stats
            .player_count
            .store(self.simulation.player_count(), Ordering::Relaxed);
        self.stats
            .game_started
            .store(self.simulation.is_started(), Ordering::Relaxed);

        // No receivers is fine
        let _ = self
            .state_tx
            .send(ServerMsg::GameState(self.simulation.game_state()));
    }
}

/// Fire-and-forget send to one connection
fn deliver(outbox: &mpsc::Sender<Outbound>, msg: Outbound) {
    if let Err(e) = outbox.try_send(msg) {
        warn!(error = %e, "Dropped addressed message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Ball, GameConfig, GameStateSnapshot, Side};
    use tokio_test::assert_ok;

    const DELAY: Duration = Duration::from_secs(5);

    fn simulation() -> Simulation {
        let config = GameConfig {
            width: 600,
            height: 400,
            restart_delay: DELAY,
            random_serve: false,
        };
        Simulation::new(&config, 42)
    }

    fn join(conn_id: &str) -> (SessionEvent, mpsc::Receiver<Outbound>) {
        let (outbox, inbox) = mpsc::channel(8);
        let event = SessionEvent::Join {
            conn_id: conn_id.to_string(),
            player_id: None,
            outbox,
        };
        (event, inbox)
    }

    fn latest_state(rx: &mut broadcast::Receiver<ServerMsg>) -> GameStateSnapshot {
        let mut latest = None;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::GameState(state) = msg {
                latest = Some(state);
            }
        }
        latest.expect("no gameState broadcast")
    }

    #[test]
    fn join_acknowledges_and_broadcasts() {
        let (mut session, handle) = Session::new(simulation(), DELAY);
        let mut states = handle.subscribe();

        let (event, mut inbox) = join("a");
        session.handle_event(event);

        match inbox.try_recv() {
            Ok(Outbound::Send(ServerMsg::Joined { player_id, side })) => {
                assert_eq!(player_id, "a");
                assert_eq!(side, Side::Left);
            }
            other => panic!("unexpected outbound: {:?}", other),
        }

        let state = latest_state(&mut states);
        assert_eq!(state.players.len(), 1);
        assert!(!state.game_started);
        assert_eq!(handle.stats.player_count(), 1);
    }

    #[test]
    fn fifth_join_is_rejected_and_closed() {
        let (mut session, handle) = Session::new(simulation(), DELAY);
        let mut states = handle.subscribe();

        let mut inboxes = Vec::new();
        for id in ["a", "b", "c", "d"] {
            let (event, inbox) = join(id);
            session.handle_event(event);
            inboxes.push(inbox);
        }
        let before = latest_state(&mut states);

        let (event, mut inbox) = join("e");
        session.handle_event(event);

        match inbox.try_recv() {
            Ok(Outbound::Send(ServerMsg::Message { message })) => {
                assert_eq!(message, "Game is full")
            }
            other => panic!("unexpected outbound: {:?}", other),
        }
        assert!(matches!(inbox.try_recv(), Ok(Outbound::Close)));

        // Rejection does not broadcast and leaves state alone
        assert!(states.try_recv().is_err());
        assert_eq!(session.simulation.game_state(), before);
        assert!(handle.stats.game_started());
    }

    #[test]
    fn moves_broadcast_even_when_ignored() {
        let (mut session, handle) = Session::new(simulation(), DELAY);
        let (event, _inbox) = join("a");
        session.handle_event(event);
        let mut states = handle.subscribe();

        session.handle_event(SessionEvent::Move {
            conn_id: "a".into(),
            direction: "down".into(),
        });
        assert_eq!(latest_state(&mut states).players[0].paddle.y, 110.0);

        session.handle_event(SessionEvent::Move {
            conn_id: "a".into(),
            direction: "left".into(),
        });
        assert_eq!(latest_state(&mut states).players[0].paddle.y, 110.0);

        session.handle_event(SessionEvent::Move {
            conn_id: "a".into(),
            direction: "sideways".into(),
        });
        assert_eq!(latest_state(&mut states).players[0].paddle.y, 110.0);

        // A connection without a side gets nothing broadcast
        session.handle_event(SessionEvent::Move {
            conn_id: "stranger".into(),
            direction: "down".into(),
        });
        assert!(states.try_recv().is_err());
    }

    #[test]
    fn disconnect_removes_player_and_stops_game() {
        let (mut session, handle) = Session::new(simulation(), DELAY);
        let mut inboxes = Vec::new();
        for id in ["a", "b"] {
            let (event, inbox) = join(id);
            session.handle_event(event);
            inboxes.push(inbox);
        }
        let mut states = handle.subscribe();

        session.handle_event(SessionEvent::Disconnect {
            conn_id: "a".into(),
        });
        let state = latest_state(&mut states);
        assert_eq!(state.players.len(), 1);
        assert!(!state.game_started);

        // Unknown connection still triggers a broadcast
        session.handle_event(SessionEvent::Disconnect {
            conn_id: "zzz".into(),
        });
        assert_eq!(latest_state(&mut states).players.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ball_out_schedules_restart_after_delay() {
        let mut sim = simulation();
        sim.add_player("a".into()).unwrap();
        sim.add_player("b".into()).unwrap();
        sim.place_ball(Ball { x: 598.0, y: 50.0, dx: 2.0, dy: 0.0 });

        let (session, handle) = Session::new(sim, DELAY);
        let mut states = handle.subscribe();
        let started_at = Instant::now();
        let task = tokio::spawn(session.run());

        let mut saw_stop = false;
        loop {
            let msg = match states.recv().await {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("broadcast closed: {}", e),
            };
            let ServerMsg::GameState(state) = msg else {
                continue;
            };

            if !state.game_started {
                saw_stop = true;
                continue;
            }
            if saw_stop {
                assert!(started_at.elapsed() >= DELAY);
                assert_eq!(state.ball.x, 300.0);
                assert_eq!(state.ball.y, 200.0);
                break;
            }
        }

        drop(handle);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn run_routes_events_through_the_channel() {
        let (session, handle) = Session::new(simulation(), DELAY);
        let mut states = handle.subscribe();
        let task = tokio::spawn(session.run());

        let (event_a, mut inbox_a) = join("a");
        let (event_b, _inbox_b) = join("b");
        assert_ok!(handle.events_tx.send(event_a).await);
        assert_ok!(handle.events_tx.send(event_b).await);

        assert!(matches!(
            inbox_a.recv().await,
            Some(Outbound::Send(ServerMsg::Joined { side: Side::Left, .. }))
        ));

        loop {
            if let Ok(ServerMsg::GameState(state)) = states.recv().await {
                if state.game_started {
                    assert_eq!(state.players.len(), 2);
                    break;
                }
            }
        }
        assert!(handle.stats.game_started());

        task.abort();
    }
}
