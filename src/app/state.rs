//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::Simulation;
use crate::session::{Session, SessionHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: SessionHandle,
}

impl AppState {
    /// Build state around a fresh simulation. The returned session must be
    /// spawned by the caller.
    pub fn new(config: Config) -> (Self, Session) {
        let config = Arc::new(config);

        // The one shared game for this process
        let simulation = Simulation::new(&config.game, config.seed);
        let (session, handle) = Session::new(simulation, config.game.restart_delay);

        let state = Self {
            config,
            session: handle,
        };

        (state, session)
    }
}
