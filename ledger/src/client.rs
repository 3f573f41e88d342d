use std::time::Duration;

use comms::specs::{
    ContentRef, Identity,
    ledger::{Answer, Call, Query, Receipt, RoundState, TaskInfo, TxOutcome},
};
use log::{debug, info, warn};
use tokio::time::{self, Instant};

use crate::{LedgerErr, LedgerTransport, Result};

/// How long a mutating call waits for its transaction to be mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// The client every process uses to read and write the round contract.
///
/// Every read goes to the ledger, nothing is cached between calls.
pub struct RoundLedger<T: LedgerTransport> {
    transport: T,
    account: Identity,
    confirmation: ConfirmationPolicy,
    rewards_enabled: bool,
}

impl<T: LedgerTransport> RoundLedger<T> {
    /// Creates a new `RoundLedger`.
    ///
    /// # Arguments
    /// * `transport` - The access to the ledger.
    /// * `account` - The account that signs every mutating call.
    ///
    /// # Returns
    /// A new `RoundLedger` instance.
    pub fn new(transport: T, account: Identity) -> Self {
        Self {
            transport,
            account,
            confirmation: ConfirmationPolicy::default(),
            rewards_enabled: false,
        }
    }

    /// Creates a new `RoundLedger` signing with the `index`-th account unlocked on the node.
    ///
    /// # Errors
    /// `UnknownAccount` if the node has no such account.
    pub async fn with_account_index(transport: T, index: usize) -> Result<Self> {
        let accounts = match transport.query(Query::Accounts).await? {
            Answer::Accounts(accounts) => accounts,
            other => {
                return Err(LedgerErr::Protocol(format!(
                    "unexpected answer {other:?} to an accounts query"
                )));
            }
        };

        let account = accounts
            .get(index)
            .cloned()
            .ok_or(LedgerErr::UnknownAccount {
                index,
                available: accounts.len(),
            })?;

        Ok(Self::new(transport, account))
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Enables the token distribution, `distribute_rewards` is a no-op otherwise.
    pub fn with_rewards(mut self, enabled: bool) -> Self {
        self.rewards_enabled = enabled;
        self
    }

    pub fn account(&self) -> &Identity {
        &self.account
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn rewards_enabled(&self) -> bool {
        self.rewards_enabled
    }

    /// The round currently open on chain.
    pub async fn current_round(&self) -> Result<u64> {
        self.query(Query::CurrentRound, |answer| match answer {
            Answer::Round(round) => Ok(round),
            other => Err(other),
        })
        .await
    }

    pub async fn task(&self) -> Result<TaskInfo> {
        self.query(Query::Task, |answer| match answer {
            Answer::Task(task) => Ok(task),
            other => Err(other),
        })
        .await
    }

    /// Seeds the task and round 0's global model.
    ///
    /// # Arguments
    /// * `genesis` - The reference of the initial model.
    /// * `total_rounds` - The amount of training rounds.
    /// * `trainer_count` - The amount of trainers selected per round.
    ///
    /// # Returns
    /// The receipt of the transaction, or `None` if the task was already initialized.
    pub async fn initialize(
        &self,
        genesis: &ContentRef,
        total_rounds: u64,
        trainer_count: usize,
    ) -> Result<Option<Receipt>> {
        let task = self.task().await?;

        if task.initialized {
            if task.genesis != genesis.as_str()
                || task.total_rounds != total_rounds
                || task.trainer_count != trainer_count
            {
                warn!(
                    genesis = task.genesis.as_str(),
                    total_rounds = task.total_rounds,
                    trainer_count = task.trainer_count;
                    "task already initialized with different arguments, keeping the existing ones"
                );
            } else {
                info!("task already initialized, skipping");
            }

            return Ok(None);
        }

        let call = Call::Initialize {
            genesis: genesis.to_string(),
            total_rounds,
            trainer_count,
        };

        self.transact(call).await.map(Some)
    }

    /// The global model of `round`, `None` if it wasn't published.
    pub async fn global_model_ref(&self, round: u64) -> Result<Option<ContentRef>> {
        self.reference(Query::GlobalModel { round }).await
    }

    pub async fn selected_trainers(&self, round: u64) -> Result<Vec<Identity>> {
        self.query(Query::SelectedTrainers { round }, |answer| match answer {
            Answer::Trainers(trainers) => Ok(trainers),
            other => Err(other),
        })
        .await
    }

    /// Writes the trainers selected for `round`.
    ///
    /// Selecting the same set again is a no-op, selecting a different one or selecting
    /// for a round other than the current one is a `StateConflict`.
    pub async fn select_trainers(&self, round: u64, trainers: &[Identity]) -> Result<Receipt> {
        let current = self.current_round().await?;

        if round != current {
            return Err(LedgerErr::StateConflict {
                call: "selectTrainersForRound",
                detail: format!("round {round} is not the current round {current}"),
            });
        }

        let call = Call::SelectTrainers {
            round,
            trainers: trainers.to_vec(),
        };

        self.transact(call).await
    }

    /// Records this account's update for `round`, overwriting a previous one.
    pub async fn submit_update(&self, round: u64, reference: &ContentRef) -> Result<Receipt> {
        let call = Call::SubmitUpdate {
            round,
            reference: reference.to_string(),
        };

        self.transact(call).await
    }

    pub async fn update_of(&self, round: u64, trainer: &Identity) -> Result<Option<ContentRef>> {
        let query = Query::Update {
            round,
            trainer: trainer.clone(),
        };

        self.reference(query).await
    }

    /// Records the aggregated model of `round`, which advances the current round.
    pub async fn submit_global_model(&self, round: u64, reference: &ContentRef) -> Result<Receipt> {
        let call = Call::SubmitGlobalModel {
            round,
            reference: reference.to_string(),
        };

        self.transact(call).await
    }

    /// Records the score of `trainer`'s update in `round`.
    ///
    /// # Errors
    /// `InvalidScore` without sending anything if `score` is above 100.
    pub async fn submit_score(&self, round: u64, trainer: &Identity, score: u32) -> Result<Receipt> {
        if score > 100 {
            return Err(LedgerErr::InvalidScore { score });
        }

        let call = Call::SubmitScore {
            round,
            trainer: trainer.clone(),
            score,
        };

        self.transact(call).await
    }

    pub async fn score_of(&self, round: u64, trainer: &Identity) -> Result<Option<u8>> {
        let query = Query::Score {
            round,
            trainer: trainer.clone(),
        };

        self.query(query, |answer| match answer {
            Answer::Score(score) => Ok(score),
            other => Err(other),
        })
        .await
    }

    pub async fn round_state(&self, round: u64) -> Result<RoundState> {
        self.query(Query::RoundState { round }, |answer| match answer {
            Answer::State(state) => Ok(state),
            other => Err(other),
        })
        .await
    }

    /// Moves an aggregated round to `Scored` without waiting for the updates left
    /// unscored.
    pub async fn close_scoring(&self, round: u64) -> Result<Receipt> {
        self.transact(Call::CloseScoring { round }).await
    }

    pub async fn finalize_round(&self, round: u64) -> Result<Receipt> {
        self.transact(Call::FinalizeRound { round }).await
    }

    /// Splits `total_reward` among the trainers scored in `round`.
    ///
    /// # Returns
    /// `None` without touching the ledger if rewards are disabled.
    pub async fn distribute_rewards(&self, round: u64, total_reward: u64) -> Result<Option<Receipt>> {
        if !self.rewards_enabled {
            debug!(round = round; "rewards disabled, skipping distribution");
            return Ok(None);
        }

        let call = Call::DistributeTokens {
            round,
            total_reward,
        };

        self.transact(call).await.map(Some)
    }

    pub async fn balance_of(&self, account: &Identity) -> Result<u64> {
        let query = Query::Balance {
            account: account.clone(),
        };

        self.query(query, |answer| match answer {
            Answer::Balance(balance) => Ok(balance),
            other => Err(other),
        })
        .await
    }

    pub async fn accounts(&self) -> Result<Vec<Identity>> {
        self.query(Query::Accounts, |answer| match answer {
            Answer::Accounts(accounts) => Ok(accounts),
            other => Err(other),
        })
        .await
    }

    async fn query<V, F>(&self, query: Query, pick: F) -> Result<V>
    where
        F: FnOnce(Answer) -> std::result::Result<V, Answer>,
    {
        let answer = self.transport.query(query.clone()).await?;

        pick(answer).map_err(|other| {
            LedgerErr::Protocol(format!("unexpected answer {other:?} to {query:?}"))
        })
    }

    async fn reference(&self, query: Query) -> Result<Option<ContentRef>> {
        let raw = self
            .query(query, |answer| match answer {
                Answer::Reference(raw) => Ok(raw),
                other => Err(other),
            })
            .await?;

        Ok(ContentRef::parse(raw).ok())
    }

    /// Submits `call` and waits until it's mined.
    async fn transact(&self, call: Call) -> Result<Receipt> {
        let name = call.name();
        let tx = self.transport.submit(&self.account, call).await?;
        debug!(tx = tx.0, call = name; "transaction sent");

        let ConfirmationPolicy {
            timeout,
            poll_interval,
        } = self.confirmation;

        // Only the sleeps are bounded, a receipt request is never cut halfway.
        let deadline = Instant::now() + timeout;

        let mined = loop {
            if let Some(mined) = self.transport.receipt(tx).await? {
                break mined;
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(tx = tx.0, call = name; "transaction not confirmed in time");
                return Err(LedgerErr::ConfirmationTimeout {
                    call: name,
                    tx,
                    after: timeout,
                });
            }

            time::sleep_until((now + poll_interval).min(deadline)).await;
        };

        match mined.outcome {
            TxOutcome::Confirmed => {
                debug!(tx = tx.0, block = mined.receipt.block, call = name; "transaction confirmed");
                Ok(mined.receipt)
            }
            TxOutcome::Reverted(revert) => Err(LedgerErr::from_revert(name, revert)),
        }
    }
}
