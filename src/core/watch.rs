//! Watch channel - wakes observers whenever the board visibly changes.
//!
//! A generation counter under the mutex makes notifications level-triggered:
//! a waiter that arrives after `notify` but reads the bumped generation on
//! its next wait does not sleep through the change it has already seen.

use std::sync::{Condvar, Mutex};

use crate::types::GameError;

#[derive(Debug, Default)]
struct WatchState {
    generation: u64,
    cancelled: bool,
}

/// Condition-variable channel shared by the board and all of its cards.
///
/// Cards hold an `Arc<WatchChannel>` instead of a reference to the board, so
/// the per-card state machine can be tested without constructing a board.
#[derive(Debug, Default)]
pub struct WatchChannel {
    state: Mutex<WatchState>,
    cond: Condvar,
}

impl WatchChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every caller currently blocked in [`wait`](Self::wait).
    pub fn notify(&self) {
        let mut state = self.state.lock().unwrap();
        state.generation = state.generation.wrapping_add(1);
        self.cond.notify_all();
    }

    /// Block until the next [`notify`](Self::notify).
    ///
    /// Returns `Err(Cancelled)` if the channel is shut down while waiting.
    /// Spurious wakes are absorbed by re-checking the generation.
    pub fn wait(&self) -> Result<(), GameError> {
        let mut state = self.state.lock().unwrap();
        let seen = state.generation;
        while state.generation == seen {
            if state.cancelled {
                return Err(GameError::Cancelled);
            }
            state = self.cond.wait(state).unwrap();
        }
        Ok(())
    }

    /// Fail all current and future waiters with `Cancelled`.
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap();
        state.cancelled = true;
        self.cond.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }
}
