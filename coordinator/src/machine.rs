use comms::specs::ledger::RoundState;

use crate::{CoordinatorErr, Result};

/// Tracks the progress of a single round, only ever one step forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundMachine {
    round: u64,
    state: RoundState,
}

impl RoundMachine {
    pub fn new(round: u64) -> Self {
        Self {
            round,
            state: RoundState::Created,
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Moves to `to` if it's the state right after the current one.
    ///
    /// # Errors
    /// `IllegalTransition` otherwise, the state is left untouched.
    pub fn advance(&mut self, to: RoundState) -> Result<()> {
        if next(self.state) != Some(to) {
            return Err(CoordinatorErr::IllegalTransition {
                round: self.round,
                from: self.state,
                to,
            });
        }

        self.state = to;
        Ok(())
    }
}

fn next(state: RoundState) -> Option<RoundState> {
    use RoundState::*;

    match state {
        Created => Some(TrainersSelected),
        TrainersSelected => Some(CollectingUpdates),
        CollectingUpdates => Some(Aggregated),
        Aggregated => Some(Scored),
        Scored => Some(Finalized),
        Finalized => None,
    }
}
