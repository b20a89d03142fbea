use crate::error::AppError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Initializing,
    Running,
    Stopping,
    Stopped,
}

/// Tracks the recording session lifecycle and fans state changes out to
/// subscribers. Transitions are validated so a failed start can never leave
/// a half-running session behind.
pub struct StateManager {
    state: Arc<RwLock<SessionState>>,
    state_tx: Sender<SessionState>,
    state_rx: Receiver<SessionState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(SessionState::Initializing)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: SessionState) -> Result<(), AppError> {
        let mut current = self.state.write();

        let valid = matches!(
            (&*current, &new_state),
            (SessionState::Initializing, SessionState::Running)
                | (SessionState::Initializing, SessionState::Stopped)
                | (SessionState::Running, SessionState::Stopping)
                | (SessionState::Stopping, SessionState::Stopped)
        );

        if !valid {
            return Err(AppError::Fatal(format!(
                "invalid session state transition: {:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!("session state: {:?} -> {:?}", *current, new_state);
        *current = new_state.clone();
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn subscribe(&self) -> Receiver<SessionState> {
        self.state_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_lifecycle() {
        let mgr = StateManager::new();
        assert_eq!(mgr.current(), SessionState::Initializing);
        mgr.transition(SessionState::Running).unwrap();
        mgr.transition(SessionState::Stopping).unwrap();
        mgr.transition(SessionState::Stopped).unwrap();
        assert_eq!(mgr.current(), SessionState::Stopped);
    }

    #[test]
    fn failed_start_goes_straight_to_stopped() {
        let mgr = StateManager::new();
        mgr.transition(SessionState::Stopped).unwrap();
    }

    #[test]
    fn rejects_restart_after_stop() {
        let mgr = StateManager::new();
        mgr.transition(SessionState::Stopped).unwrap();
        assert!(mgr.transition(SessionState::Running).is_err());
    }

    #[test]
    fn subscribers_see_transitions() {
        let mgr = StateManager::new();
        let rx = mgr.subscribe();
        mgr.transition(SessionState::Running).unwrap();
        assert_eq!(rx.try_recv().unwrap(), SessionState::Running);
    }
}
