use comms::specs::Identity;
use rand::{Rng, seq::IndexedRandom};

use crate::{CoordinatorErr, Result};

/// Picks the trainers of each round uniformly at random, without replacement.
pub struct TrainerSampler<R: Rng> {
    rng: R,
}

impl<R: Rng> TrainerSampler<R> {
    /// Creates a new `TrainerSampler` drawing from `rng`.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draws `count` distinct identities from `pool`.
    ///
    /// # Errors
    /// `InsufficientTrainers` if the pool has fewer than `count` identities.
    pub fn sample(&mut self, pool: &[Identity], count: usize) -> Result<Vec<Identity>> {
        if pool.len() < count {
            return Err(CoordinatorErr::InsufficientTrainers {
                needed: count,
                available: pool.len(),
            });
        }

        Ok(pool.choose_multiple(&mut self.rng, count).cloned().collect())
    }
}
