//! `GameFSM`: global turn state and its transition rules.
//!
//! Transitions are edge-triggered — scripts compare `current()` against `previous()` to
//! run one-shot logic on the frame a transition happened. `previous` only updates once
//! per frame, at [`GameFsm::end_frame`] (called from the engine's per-frame driver,
//! after scripts have had a chance to observe the edge), not on every `transition_to`
//! call, so multiple transitions requested within one frame still read as a single edge.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameState {
    Splash,
    Planning,
    Deployment,
    Execute,
    Pause,
    Win,
    Lose,
}

pub const DEFAULT_SPLASH_DURATION: f32 = 2.0;

/// Global turn-state machine. Carried as an explicit field on the engine's context
/// rather than a process-wide singleton, per Design Note "Singletons for Managers".
pub struct GameFsm {
    current: GameState,
    previous: GameState,
    splash_elapsed: f32,
    splash_duration: f32,
    /// State to restore on resume from `Pause`.
    paused_from: Option<GameState>,
}

impl GameFsm {
    pub fn new() -> Self {
        Self {
            current: GameState::Splash,
            previous: GameState::Splash,
            splash_elapsed: 0.0,
            splash_duration: DEFAULT_SPLASH_DURATION,
            paused_from: None,
        }
    }

    pub fn current(&self) -> GameState {
        self.current
    }

    pub fn previous(&self) -> GameState {
        self.previous
    }

    /// Edge-triggered check: true the frame a transition occurred, false thereafter
    /// until `end_frame` is called and another transition happens.
    pub fn did_transition(&self) -> bool {
        self.current != self.previous
    }

    fn transition_to(&mut self, state: GameState) {
        if self.current != state {
            debug!(from = ?self.current, to = ?state, "GameFSM transition");
            self.current = state;
        }
    }

    /// Called once per frame after scripts have observed `did_transition`, so the next
    /// frame's edge check compares against this frame's settled state.
    pub fn end_frame(&mut self) {
        self.previous = self.current;
    }

    /// `SPLASH -> PLANNING` after the splash timer elapses.
    pub fn tick_splash(&mut self, dt: f32) {
        if self.current == GameState::Splash {
            self.splash_elapsed += dt;
            if self.splash_elapsed >= self.splash_duration {
                self.transition_to(GameState::Planning);
            }
        }
    }

    /// `SPLASH -> PLANNING` on any key event during splash.
    pub fn on_key_event(&mut self) {
        if self.current == GameState::Splash {
            self.transition_to(GameState::Planning);
        }
    }

    /// `PLANNING -> EXECUTE`, raised by `TurnController` once all deployed cats
    /// committed a plan.
    pub fn request_execute(&mut self) {
        if self.current == GameState::Planning {
            self.transition_to(GameState::Execute);
        }
    }

    /// `EXECUTE -> PLANNING`, raised once every agent reports `finishedExecution`.
    pub fn request_planning(&mut self) {
        if self.current == GameState::Execute || self.current == GameState::Deployment {
            self.transition_to(GameState::Planning);
        }
    }

    /// `PLANNING <-> DEPLOYMENT` toggle, entered while placing a caged cat's rescue path
    /// or similar pre-turn setup.
    pub fn toggle_deployment(&mut self) {
        match self.current {
            GameState::Planning => self.transition_to(GameState::Deployment),
            GameState::Deployment => self.transition_to(GameState::Planning),
            _ => {}
        }
    }

    /// `* -> PAUSE` on pause-key or window loss-of-focus. Remembers the prior state.
    pub fn pause(&mut self) {
        if self.current != GameState::Pause {
            self.paused_from = Some(self.current);
            self.transition_to(GameState::Pause);
        }
    }

    /// Restores the state remembered at the matching `pause()` call.
    pub fn resume(&mut self) {
        if self.current == GameState::Pause {
            if let Some(prior) = self.paused_from.take() {
                self.transition_to(prior);
            }
        }
    }

    /// `* -> WIN` when no rats remain in the scene.
    pub fn win(&mut self) {
        self.transition_to(GameState::Win);
    }

    /// `* -> LOSE` when the main cat's health reaches 0 or it leaves the playable set.
    pub fn lose(&mut self) {
        self.transition_to(GameState::Lose);
    }
}

impl Default for GameFsm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splash_times_out_to_planning() {
        let mut fsm = GameFsm::new();
        fsm.tick_splash(1.0);
        assert_eq!(fsm.current(), GameState::Splash);
        fsm.tick_splash(1.5);
        assert_eq!(fsm.current(), GameState::Planning);
    }

    #[test]
    fn key_event_skips_splash_immediately() {
        let mut fsm = GameFsm::new();
        fsm.on_key_event();
        assert_eq!(fsm.current(), GameState::Planning);
    }

    #[test]
    fn pause_then_resume_restores_prior_state() {
        let mut fsm = GameFsm::new();
        fsm.on_key_event();
        fsm.request_execute();
        assert_eq!(fsm.current(), GameState::Execute);

        fsm.pause();
        assert_eq!(fsm.current(), GameState::Pause);
        fsm.resume();
        assert_eq!(fsm.current(), GameState::Execute);
    }

    #[test]
    fn edge_trigger_settles_after_end_frame() {
        let mut fsm = GameFsm::new();
        fsm.on_key_event();
        assert!(fsm.did_transition());
        fsm.end_frame();
        assert!(!fsm.did_transition());
    }

    #[test]
    fn win_and_lose_are_reachable_from_any_state() {
        let mut fsm = GameFsm::new();
        fsm.win();
        assert_eq!(fsm.current(), GameState::Win);

        let mut fsm2 = GameFsm::new();
        fsm2.on_key_event();
        fsm2.lose();
        assert_eq!(fsm2.current(), GameState::Lose);
    }
}
