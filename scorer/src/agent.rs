use std::{collections::BTreeMap, time::Duration};

use blobstore::{BlobClient, BlobTransport};
use comms::specs::{ContentRef, Identity, ledger::RoundState};
use ledger::{LedgerTransport, RoundLedger};
use log::{debug, info, warn};
use model::TrainableModel;
use tokio::{task, time};

use crate::{Result, ScorerErr};

/// Passes over a round with unreachable updates before its scoring is closed without them.
pub const SCORING_ATTEMPTS: u32 = 3;

/// Maps an accuracy in `[0, 1]` to an integer score in `[0, 100]`, rounding down.
///
/// Anything that isn't a number scores 0.
pub fn score_from_accuracy(accuracy: f32) -> u32 {
    if accuracy.is_nan() {
        return 0;
    }

    (accuracy * 100.0).floor().clamp(0.0, 100.0) as u32
}

/// The result of a scoring pass over a round.
#[derive(Debug, Default)]
pub struct ScoreReport {
    pub round: u64,
    pub scored: Vec<(Identity, u32)>,
    /// Selected trainers without an update.
    pub absent: Vec<Identity>,
    /// Trainers whose update couldn't be scored, no score was recorded for them.
    pub failed: Vec<(Identity, ScorerErr)>,
    /// Whether the pass closed the round's scoring with updates left unscored.
    pub closed: bool,
}

impl ScoreReport {
    fn new(round: u64) -> Self {
        Self {
            round,
            ..Default::default()
        }
    }
}

/// Evaluates trainer updates against a held out dataset and records their scores.
pub struct ScoringAgent<L, B, M>
where
    L: LedgerTransport,
    B: BlobTransport,
    M: TrainableModel,
{
    ledger: RoundLedger<L>,
    blobs: BlobClient<B>,
    model: M,
}

impl<L, B, M> ScoringAgent<L, B, M>
where
    L: LedgerTransport,
    B: BlobTransport,
    M: TrainableModel,
{
    /// Creates a new `ScoringAgent`.
    ///
    /// # Arguments
    /// * `ledger` - The ledger client, signing with an account allowed to score.
    /// * `blobs` - The blob exchange client.
    /// * `model` - The model every update is loaded into, holding the evaluation dataset.
    ///
    /// # Returns
    /// A new `ScoringAgent` instance.
    pub fn new(ledger: RoundLedger<L>, blobs: BlobClient<B>, model: M) -> Self {
        Self {
            ledger,
            blobs,
            model,
        }
    }

    /// Scores every update of an aggregated round.
    ///
    /// Trainers already scored are skipped, so a pass can be repeated to retry the
    /// ones that failed. When nothing left unscored is worth retrying the round's
    /// scoring is closed.
    ///
    /// # Errors
    /// `RoundNotAggregated` if the round isn't waiting for scores.
    pub async fn score_round(&mut self, round: u64) -> Result<ScoreReport> {
        let state = self.ledger.round_state(round).await?;
        if state != RoundState::Aggregated {
            return Err(ScorerErr::RoundNotAggregated { round, state });
        }

        let mut report = ScoreReport::new(round);

        for trainer in self.ledger.selected_trainers(round).await? {
            let Some(update) = self.ledger.update_of(round, &trainer).await? else {
                debug!(round = round, trainer = trainer.as_str(); "no update to score");
                report.absent.push(trainer);
                continue;
            };

            if self.ledger.score_of(round, &trainer).await?.is_some() {
                continue;
            }

            match self.score_update(round, &trainer, &update).await {
                Ok(score) => report.scored.push((trainer, score)),
                Err(e) => {
                    warn!(round = round, trainer = trainer.as_str(); "update not scored: {e}");
                    report.failed.push((trainer, e));
                }
            }
        }

        let retryable = report.failed.iter().any(|(_, e)| e.is_retryable());
        if !retryable && self.ledger.round_state(round).await? == RoundState::Aggregated {
            self.ledger.close_scoring(round).await?;
            report.closed = true;
        }

        info!(
            round = round,
            scored = report.scored.len(),
            absent = report.absent.len(),
            failed = report.failed.len(),
            closed = report.closed;
            "scoring pass done"
        );

        Ok(report)
    }

    /// The accuracy of `round`'s global model, nothing is written to the ledger.
    pub async fn evaluate_global(&mut self, round: u64) -> Result<f32> {
        let global = self
            .ledger
            .global_model_ref(round)
            .await?
            .ok_or(ScorerErr::MissingGlobalModel { round })?;

        let accuracy = self.evaluate(&global).await?;
        info!(round = round, accuracy = accuracy; "global model evaluated");
        Ok(accuracy)
    }

    /// Scores each round as soon as it's aggregated, until the last round of the task
    /// is scored.
    ///
    /// Rounds with unreachable updates are retried on the following polls, up to
    /// `SCORING_ATTEMPTS` passes, then closed without those scores.
    pub async fn watch(&mut self, poll: Duration) -> Result<()> {
        let mut next = 1;
        let mut retrying: BTreeMap<u64, u32> = BTreeMap::new();

        loop {
            let task = self.ledger.task().await?;
            let current = self.ledger.current_round().await?;

            let due: Vec<_> = retrying.iter().map(|(&round, &done)| (round, done)).collect();
            for (round, done) in due {
                if self.pass(round, done + 1).await? {
                    retrying.remove(&round);
                } else {
                    retrying.insert(round, done + 1);
                }
            }

            while next < current {
                match self.ledger.round_state(next).await? {
                    RoundState::Aggregated => {
                        if !self.pass(next, 1).await? {
                            retrying.insert(next, 1);
                        }
                    }
                    RoundState::Scored | RoundState::Finalized => {}
                    state => {
                        warn!(round = next; "round is {state} behind the current round, skipping it");
                    }
                }

                next += 1;
            }

            if task.initialized && next > task.total_rounds && retrying.is_empty() {
                info!(rounds = task.total_rounds; "every round is scored");
                return Ok(());
            }

            time::sleep(poll).await;
        }
    }

    /// Runs the `attempt`-th scoring pass over `round`.
    ///
    /// # Returns
    /// Whether the round needs no further pass.
    async fn pass(&mut self, round: u64, attempt: u32) -> Result<bool> {
        let report = match self.score_round(round).await {
            Ok(report) => report,
            Err(ScorerErr::RoundNotAggregated { .. }) => return Ok(true),
            Err(e) => return Err(e),
        };

        if report.failed.is_empty() || report.closed {
            return Ok(true);
        }

        if attempt < SCORING_ATTEMPTS {
            debug!(round = round, attempt = attempt; "unscored updates left, retrying later");
            return Ok(false);
        }

        warn!(
            round = round,
            unscored = report.failed.len();
            "giving up on the unscored updates after {attempt} passes"
        );
        self.ledger.close_scoring(round).await?;
        Ok(true)
    }

    async fn score_update(&mut self, round: u64, trainer: &Identity, update: &ContentRef) -> Result<u32> {
        let accuracy = self.evaluate(update).await?;
        let score = score_from_accuracy(accuracy);

        self.ledger.submit_score(round, trainer, score).await?;
        debug!(round = round, trainer = trainer.as_str(), score = score; "score recorded");
        Ok(score)
    }

    async fn evaluate(&mut self, reference: &ContentRef) -> Result<f32> {
        let bytes = self.blobs.fetch(reference).await?;
        let model = &mut self.model;

        let accuracy = task::block_in_place(|| -> Result<f32> {
            model.load_bytes(&bytes)?;
            Ok(model.evaluate()?)
        })?;

        Ok(accuracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_is_floored_into_a_percentage() {
        assert_eq!(score_from_accuracy(0.9999), 99);
        assert_eq!(score_from_accuracy(1.0), 100);
        assert_eq!(score_from_accuracy(0.0), 0);
        assert_eq!(score_from_accuracy(0.5), 50);
    }

    #[test]
    fn out_of_range_accuracy_is_clamped() {
        assert_eq!(score_from_accuracy(f32::NAN), 0);
        assert_eq!(score_from_accuracy(-0.2), 0);
        assert_eq!(score_from_accuracy(1.7), 100);
    }
}
