use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use blobstore::{BlobClient, BlobTransport};
use comms::specs::{
    ContentRef, Identity,
    fit::{FitIns, FitRes},
    ledger::RoundState,
};
use futures::{StreamExt, stream};
use ledger::{LedgerErr, LedgerTransport, RoundLedger};
use log::{debug, info, warn};
use model::TrainableModel;
use rand::Rng;
use tokio::{
    sync::Mutex,
    task::{self, JoinSet},
    time::{self, Instant},
};

use crate::{
    CoordinatorConfig, CoordinatorErr, Participant, Result, RoundMachine, TrainerSampler,
    aggregate,
};

/// What happened in a round the coordinator drove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round: u64,
    pub selected: Vec<Identity>,
    /// Trainers whose update went into the global model.
    pub aggregated: Vec<Identity>,
    pub global: ContentRef,
    /// `Finalized`, or `Aggregated` if the scorer missed the scoring deadline.
    pub state: RoundState,
    pub rewarded: bool,
}

/// Drives the rounds of a task, one at a time.
pub struct Coordinator<L, B, M, P, R>
where
    L: LedgerTransport,
    B: BlobTransport + Clone + 'static,
    M: TrainableModel + Clone + 'static,
    P: Participant + 'static,
    R: Rng,
{
    ledger: RoundLedger<L>,
    blobs: BlobClient<B>,
    model: M,
    participants: BTreeMap<Identity, Arc<Mutex<P>>>,
    sampler: TrainerSampler<R>,
    config: CoordinatorConfig,
}

impl<L, B, M, P, R> Coordinator<L, B, M, P, R>
where
    L: LedgerTransport,
    B: BlobTransport + Clone + 'static,
    M: TrainableModel + Clone + 'static,
    P: Participant + 'static,
    R: Rng,
{
    /// Creates a new `Coordinator`.
    ///
    /// # Arguments
    /// * `ledger` - The ledger client, signing with the contract owner's account.
    /// * `blobs` - The blob exchange client.
    /// * `model` - A model of the trained shape, used to decode and encode parameters.
    /// * `sampler` - Picks the trainers of each round.
    /// * `config` - The run configuration.
    ///
    /// # Returns
    /// A new `Coordinator` without participants.
    pub fn new(
        ledger: RoundLedger<L>,
        blobs: BlobClient<B>,
        model: M,
        sampler: TrainerSampler<R>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            ledger,
            blobs,
            model,
            participants: BTreeMap::new(),
            sampler,
            config,
        }
    }

    /// Adds a trainer to the pool rounds are sampled from.
    pub fn register(&mut self, participant: P) {
        let identity = participant.identity().clone();
        info!(trainer = identity.as_str(); "participant registered");
        self.participants
            .insert(identity, Arc::new(Mutex::new(participant)));
    }

    /// The identities of the registered trainers, in a stable order.
    pub fn pool(&self) -> Vec<Identity> {
        self.participants.keys().cloned().collect()
    }

    pub fn ledger(&self) -> &RoundLedger<L> {
        &self.ledger
    }

    /// Hands back every participant no late fit task is holding on to.
    pub fn into_participants(self) -> Vec<P> {
        let mut out = Vec::with_capacity(self.participants.len());

        for (_, participant) in self.participants {
            match Arc::try_unwrap(participant) {
                Ok(participant) => out.push(participant.into_inner()),
                Err(shared) => {
                    let refs = Arc::strong_count(&shared);
                    warn!(refs = refs; "participant still in use, dropping it");
                }
            }
        }

        out
    }

    /// Publishes the initial model and makes it round 0's global model.
    ///
    /// Safe to call again after a restart, an already initialized task keeps its
    /// genesis model.
    ///
    /// # Arguments
    /// * `initial` - The encoded initial model.
    ///
    /// # Returns
    /// The reference of round 0's global model.
    pub async fn bootstrap(&mut self, initial: &[u8]) -> Result<ContentRef> {
        self.model.clone().load_bytes(initial)?;

        let published = self
            .blobs
            .put(initial)
            .await
            .map_err(CoordinatorErr::PublishFailed)?;

        let CoordinatorConfig {
            total_rounds,
            trainer_count,
            ..
        } = self.config;

        let genesis = match self
            .ledger
            .initialize(&published, total_rounds, trainer_count)
            .await?
        {
            Some(receipt) => {
                info!(genesis = published.as_str(), block = receipt.block; "task initialized");
                published
            }
            None => {
                let task = self.ledger.task().await?;
                ContentRef::parse(task.genesis).map_err(|e| {
                    LedgerErr::Protocol(format!("on chain genesis is invalid: {e}"))
                })?
            }
        };

        if self.ledger.current_round().await? == 0 {
            self.ledger.submit_global_model(0, &genesis).await?;
            info!(genesis = genesis.as_str(); "genesis recorded, round 1 open");
        }

        Ok(genesis)
    }

    /// Runs every remaining round of the task.
    ///
    /// # Returns
    /// The outcome of each round, stopping at the first round-level failure.
    pub async fn run(&mut self) -> Result<Vec<RoundOutcome>> {
        let task = self.ledger.task().await?;
        if !task.initialized {
            return Err(LedgerErr::NotInitialized.into());
        }

        let mut outcomes = Vec::new();
        let mut round = self.ledger.current_round().await?.max(1);

        while round <= task.total_rounds {
            match self.run_round(round).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(round = round; "round failed: {e}");
                    return Err(e);
                }
            }

            round += 1;
        }

        info!(rounds = outcomes.len(); "training done");
        Ok(outcomes)
    }

    /// Drives `round` from trainer selection to finalization.
    pub async fn run_round(&mut self, round: u64) -> Result<RoundOutcome> {
        let mut machine = RoundMachine::new(round);

        let current = self.ledger.current_round().await?;
        if current != round {
            return Err(LedgerErr::StateConflict {
                call: "currentRound",
                detail: format!("asked to run round {round} but the ledger is at {current}"),
            }
            .into());
        }

        let selected = self.select(round).await?;
        machine.advance(RoundState::TrainersSelected)?;

        machine.advance(RoundState::CollectingUpdates)?;
        let responses = self.collect(round, &selected).await;

        let (global, aggregated) = self.aggregate(round, responses).await?;
        self.ledger.submit_global_model(round, &global).await?;
        machine.advance(RoundState::Aggregated)?;
        info!(round = round, global = global.as_str(), updates = aggregated.len(); "round aggregated");

        let mut outcome = RoundOutcome {
            round,
            selected,
            aggregated,
            global,
            state: RoundState::Aggregated,
            rewarded: false,
        };

        if !self.wait_scored(round).await? {
            warn!(round = round; "scoring deadline passed, leaving the round aggregated");
            return Ok(outcome);
        }
        machine.advance(RoundState::Scored)?;

        match self
            .ledger
            .distribute_rewards(round, self.config.total_reward)
            .await
        {
            Ok(receipt) => outcome.rewarded = receipt.is_some(),
            Err(e) => warn!(round = round; "rewards not distributed: {e}"),
        }

        self.ledger.finalize_round(round).await?;
        machine.advance(RoundState::Finalized)?;
        outcome.state = machine.state();

        info!(round = round; "round finalized");
        Ok(outcome)
    }

    /// The trainers of `round`, reusing the ones already on chain.
    async fn select(&mut self, round: u64) -> Result<Vec<Identity>> {
        let existing = self.ledger.selected_trainers(round).await?;
        if !existing.is_empty() {
            info!(round = round, trainers = existing.len(); "reusing the selected trainers");
            return Ok(existing);
        }

        let task = self.ledger.task().await?;
        let selected = self.sampler.sample(&self.pool(), task.trainer_count)?;
        self.ledger.select_trainers(round, &selected).await?;

        for trainer in &selected {
            debug!(round = round, trainer = trainer.as_str(); "trainer selected");
        }

        Ok(selected)
    }

    /// Sends the fit instruction to every selected trainer and gathers the answers
    /// that arrive before the round deadline.
    ///
    /// Trainers cut off at the deadline are dropped from the pool, their channel may
    /// be left mid frame.
    async fn collect(&mut self, round: u64, selected: &[Identity]) -> Vec<(Identity, FitRes)> {
        let deadline = Instant::now() + self.config.round_deadline;
        let ins = FitIns { round };
        let mut join_set = JoinSet::new();
        let mut pending = BTreeSet::new();

        for trainer in selected {
            let Some(participant) = self.participants.get(trainer) else {
                warn!(round = round, trainer = trainer.as_str(); "selected trainer isn't registered");
                continue;
            };

            let participant = Arc::clone(participant);
            let trainer = trainer.clone();
            pending.insert(trainer.clone());

            join_set.spawn(async move {
                let mut participant = participant.lock().await;
                let res = participant.fit(ins).await;
                (trainer, res)
            });
        }

        let mut responses = Vec::with_capacity(join_set.len());

        loop {
            match time::timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok((trainer, Ok(res))))) => {
                    debug!(round = round, trainer = trainer.as_str(); "fit result received");
                    pending.remove(&trainer);
                    responses.push((trainer, res));
                }
                Ok(Some(Ok((trainer, Err(e))))) => {
                    warn!(round = round, trainer = trainer.as_str(); "trainer unreachable: {e}");
                    pending.remove(&trainer);
                }
                Ok(Some(Err(e))) => warn!(round = round; "fit task failed: {e}"),
                Ok(None) => break,
                Err(_) => {
                    warn!(round = round, late = join_set.len(); "round deadline reached, discarding late trainers");
                    join_set.abort_all();
                    break;
                }
            }
        }

        for trainer in pending {
            warn!(round = round, trainer = trainer.as_str(); "dropping a trainer cut off mid fit");
            self.participants.remove(&trainer);
        }

        responses
    }

    /// Downloads the usable updates in `responses` and publishes their mean.
    async fn aggregate(
        &self,
        round: u64,
        responses: Vec<(Identity, FitRes)>,
    ) -> Result<(ContentRef, Vec<Identity>)> {
        if responses.is_empty() {
            return Err(CoordinatorErr::NoResponses { round });
        }

        let total = responses.len();
        let mut candidates = Vec::with_capacity(total);

        for (trainer, res) in responses {
            let parsed = res.reference.map(ContentRef::parse);

            match parsed {
                Some(Ok(reference)) => candidates.push((trainer, reference)),
                Some(Err(e)) => {
                    warn!(round = round, trainer = trainer.as_str(); "skipping response: {e}");
                }
                None => {
                    let reason = res.error.unwrap_or_default();
                    warn!(round = round, trainer = trainer.as_str(); "trainer sat out: {reason}");
                }
            }
        }

        let limit = candidates.len().max(1);
        let downloads = stream::iter(candidates)
            .map(|(trainer, reference)| {
                let blobs = self.blobs.clone();
                let mut model = self.model.clone();

                async move {
                    let res = async {
                        let bytes = blobs.fetch(&reference).await?;
                        model.load_bytes(&bytes)?;
                        Ok::<_, CoordinatorErr>(model.params().to_vec())
                    }
                    .await;

                    (trainer, reference, res)
                }
            })
            .buffer_unordered(limit)
            .collect::<Vec<_>>()
            .await;

        let mut contributors = Vec::with_capacity(downloads.len());
        let mut updates = Vec::with_capacity(downloads.len());

        for (trainer, reference, res) in downloads {
            match res {
                Ok(params) => {
                    contributors.push(trainer);
                    updates.push(params);
                }
                Err(e) => warn!(
                    round = round,
                    trainer = trainer.as_str(),
                    reference = reference.as_str();
                    "skipping update: {e}"
                ),
            }
        }

        if updates.is_empty() {
            return Err(CoordinatorErr::NoValidSubmissions {
                round,
                responses: total,
            });
        }

        let mut global = self.model.clone();
        let bytes = task::block_in_place(|| -> Result<Vec<u8>> {
            let mean = aggregate::mean(&updates)?;
            let params = global.params_mut();

            if params.len() != mean.len() {
                return Err(CoordinatorErr::SizeMismatch {
                    got: mean.len(),
                    expected: params.len(),
                });
            }

            params.copy_from_slice(&mean);
            Ok(global.save_bytes())
        })?;

        let reference = self
            .blobs
            .put(&bytes)
            .await
            .map_err(CoordinatorErr::PublishFailed)?;

        Ok((reference, contributors))
    }

    /// Polls the round state until it's scored or the scoring deadline passes.
    ///
    /// # Returns
    /// Whether the round got scored in time.
    async fn wait_scored(&self, round: u64) -> Result<bool> {
        let deadline = Instant::now() + self.config.scoring_deadline;

        loop {
            match self.ledger.round_state(round).await? {
                RoundState::Scored | RoundState::Finalized => return Ok(true),
                state => debug!(round = round; "waiting for scores, the round is {state}"),
            }

            if Instant::now() >= deadline {
                return Ok(false);
            }

            time::sleep(self.config.scoring_poll).await;
        }
    }
}
