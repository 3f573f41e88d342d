use std::collections::{BTreeMap, HashMap, HashSet};

use comms::specs::{
    Identity,
    ledger::{Call, Revert, RoundState, TaskInfo},
};

/// The contract's result type, a failed call reverts with a `Revert` reason.
type Outcome = std::result::Result<(), Revert>;

#[derive(Debug, Default)]
struct RoundRecord {
    global: String,
    trainers: Vec<Identity>,
    updates: HashMap<Identity, String>,
    scores: HashMap<Identity, u8>,
    state: RoundState,
    rewarded: bool,
}

/// The round coordination contract.
///
/// Holds the task configuration and every round's record. All calls are executed
/// atomically by the hosting `Chain`, one transaction at a time.
#[derive(Debug)]
pub struct RoundContract {
    owner: Identity,
    task: TaskInfo,
    current_round: u64,
    rounds: BTreeMap<u64, RoundRecord>,
    balances: HashMap<Identity, u64>,
}

impl RoundContract {
    /// Creates a new, uninitialized `RoundContract`.
    ///
    /// # Arguments
    /// * `owner` - The account allowed to drive the rounds.
    pub fn new(owner: Identity) -> Self {
        Self {
            owner,
            task: TaskInfo::default(),
            current_round: 0,
            rounds: BTreeMap::new(),
            balances: HashMap::new(),
        }
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn task(&self) -> &TaskInfo {
        &self.task
    }

    pub fn current_round(&self) -> u64 {
        self.current_round
    }

    /// The global model reference of `round`, empty if it was never published.
    pub fn global_model(&self, round: u64) -> &str {
        self.rounds.get(&round).map_or("", |r| r.global.as_str())
    }

    pub fn selected_trainers(&self, round: u64) -> &[Identity] {
        self.rounds
            .get(&round)
            .map_or(&[][..], |r| r.trainers.as_slice())
    }

    /// The update `trainer` submitted for `round`, empty if there's none.
    pub fn update(&self, round: u64, trainer: &Identity) -> &str {
        self.rounds
            .get(&round)
            .and_then(|r| r.updates.get(trainer))
            .map_or("", String::as_str)
    }

    pub fn score(&self, round: u64, trainer: &Identity) -> Option<u8> {
        self.rounds
            .get(&round)
            .and_then(|r| r.scores.get(trainer))
            .copied()
    }

    pub fn round_state(&self, round: u64) -> RoundState {
        self.rounds.get(&round).map(|r| r.state).unwrap_or_default()
    }

    pub fn balance(&self, account: &Identity) -> u64 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Executes a state mutating call on behalf of `from`.
    ///
    /// # Arguments
    /// * `from` - The account that signed the transaction.
    /// * `call` - The call to execute.
    ///
    /// # Returns
    /// The reason of the revert if the call was rejected, in which case the state is untouched.
    pub fn execute(&mut self, from: &Identity, call: Call) -> Outcome {
        match call {
            Call::Initialize {
                genesis,
                total_rounds,
                trainer_count,
            } => self.initialize(from, genesis, total_rounds, trainer_count),
            Call::SelectTrainers { round, trainers } => {
                self.select_trainers(from, round, trainers)
            }
            Call::SubmitUpdate { round, reference } => self.submit_update(from, round, reference),
            Call::SubmitGlobalModel { round, reference } => {
                self.submit_global_model(from, round, reference)
            }
            Call::SubmitScore {
                round,
                trainer,
                score,
            } => self.submit_score(from, round, trainer, score),
            Call::CloseScoring { round } => self.close_scoring(from, round),
            Call::FinalizeRound { round } => self.finalize_round(from, round),
            Call::DistributeTokens {
                round,
                total_reward,
            } => self.distribute_tokens(from, round, total_reward),
        }
    }

    fn initialize(
        &mut self,
        from: &Identity,
        genesis: String,
        total_rounds: u64,
        trainer_count: usize,
    ) -> Outcome {
        self.only_owner(from)?;

        if self.task.initialized {
            return conflict("task already initialized");
        }

        if genesis.trim().is_empty() {
            return conflict("empty genesis reference");
        }

        if total_rounds == 0 || trainer_count == 0 {
            return conflict("the task needs at least one round and one trainer");
        }

        self.rounds.entry(0).or_default().global = genesis.clone();
        self.current_round = 0;
        self.task = TaskInfo {
            genesis,
            total_rounds,
            trainer_count,
            initialized: true,
        };

        Ok(())
    }

    fn select_trainers(&mut self, from: &Identity, round: u64, trainers: Vec<Identity>) -> Outcome {
        self.only_owner(from)?;
        self.require_initialized()?;
        self.require_current(round)?;

        if round == 0 {
            return conflict("round 0 holds the genesis model and takes no trainers");
        }

        if round > self.task.total_rounds {
            return conflict(format!(
                "all {} rounds are already done",
                self.task.total_rounds
            ));
        }

        if trainers.is_empty() {
            return conflict("empty trainer selection");
        }

        let unique: HashSet<_> = trainers.iter().collect();
        if unique.len() != trainers.len() {
            return conflict("duplicated trainer in selection");
        }

        let record = self.rounds.entry(round).or_default();

        if !record.trainers.is_empty() {
            if record.trainers == trainers {
                return Ok(());
            }

            return conflict(format!("trainers already selected for round {round}"));
        }

        record.trainers = trainers;
        record.state = RoundState::TrainersSelected;
        Ok(())
    }

    fn submit_update(&mut self, from: &Identity, round: u64, reference: String) -> Outcome {
        self.require_initialized()?;

        if round != self.current_round {
            return conflict(format!(
                "round {round} is not open for updates, current round is {}",
                self.current_round
            ));
        }

        if reference.trim().is_empty() {
            return conflict("empty update reference");
        }

        let record = self.rounds.entry(round).or_default();

        if !record.trainers.contains(from) {
            return Err(Revert::Unauthorized(from.clone()));
        }

        record.updates.insert(from.clone(), reference);
        record.state = RoundState::CollectingUpdates;
        Ok(())
    }

    fn submit_global_model(&mut self, from: &Identity, round: u64, reference: String) -> Outcome {
        self.only_owner(from)?;
        self.require_initialized()?;
        self.require_current(round)?;

        if reference.trim().is_empty() {
            return conflict("empty global model reference");
        }

        let record = self.rounds.entry(round).or_default();

        if round > 0 && record.trainers.is_empty() {
            return conflict(format!("no trainers were selected for round {round}"));
        }

        record.global = reference;
        record.state = if round == 0 {
            RoundState::Finalized
        } else {
            RoundState::Aggregated
        };

        self.current_round = round + 1;
        Ok(())
    }

    fn submit_score(&mut self, from: &Identity, round: u64, trainer: Identity, score: u32) -> Outcome {
        self.only_owner(from)?;

        let Ok(score) = u8::try_from(score) else {
            return Err(Revert::InvalidScore(score));
        };

        if score > 100 {
            return Err(Revert::InvalidScore(score.into()));
        }

        let record = self.rounds.entry(round).or_default();

        match record.state {
            RoundState::Aggregated | RoundState::Scored => {}
            state => return conflict(format!("round {round} can't be scored while {state}")),
        }

        if !record.updates.contains_key(&trainer) {
            return conflict(format!("{trainer} has no update in round {round}"));
        }

        record.scores.insert(trainer, score);

        if record.updates.keys().all(|t| record.scores.contains_key(t)) {
            record.state = RoundState::Scored;
        }

        Ok(())
    }

    fn close_scoring(&mut self, from: &Identity, round: u64) -> Outcome {
        self.only_owner(from)?;

        let record = self.rounds.entry(round).or_default();

        match record.state {
            RoundState::Aggregated => record.state = RoundState::Scored,
            RoundState::Scored => {}
            state => return conflict(format!("round {round} can't close scoring while {state}")),
        }

        Ok(())
    }

    fn finalize_round(&mut self, from: &Identity, round: u64) -> Outcome {
        self.only_owner(from)?;

        let record = self.rounds.entry(round).or_default();

        if record.state != RoundState::Scored {
            return conflict(format!(
                "round {round} can't be finalized while {}",
                record.state
            ));
        }

        record.state = RoundState::Finalized;
        Ok(())
    }

    fn distribute_tokens(&mut self, from: &Identity, round: u64, total_reward: u64) -> Outcome {
        self.only_owner(from)?;

        let record = self.rounds.entry(round).or_default();

        if !matches!(record.state, RoundState::Scored | RoundState::Finalized) {
            return conflict(format!("round {round} is {}, not scored", record.state));
        }

        if record.rewarded {
            return conflict(format!("rewards of round {round} were already distributed"));
        }

        let total_score: u64 = record.scores.values().map(|&s| s as u64).sum();
        if total_score == 0 {
            return conflict(format!("round {round} has no positive scores"));
        }

        for (trainer, &score) in &record.scores {
            let share = total_reward as u128 * score as u128 / total_score as u128;
            *self.balances.entry(trainer.clone()).or_default() += share as u64;
        }

        record.rewarded = true;
        Ok(())
    }

    fn only_owner(&self, from: &Identity) -> Outcome {
        if *from != self.owner {
            return Err(Revert::Unauthorized(from.clone()));
        }

        Ok(())
    }

    fn require_initialized(&self) -> Outcome {
        if !self.task.initialized {
            return Err(Revert::NotInitialized);
        }

        Ok(())
    }

    fn require_current(&self, round: u64) -> Outcome {
        if round != self.current_round {
            return conflict(format!(
                "current round is {}, got a call for round {round}",
                self.current_round
            ));
        }

        Ok(())
    }
}

fn conflict(detail: impl Into<String>) -> Outcome {
    Err(Revert::StateConflict(detail.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Identity {
        Identity::new("0xowner")
    }

    fn trainer(i: usize) -> Identity {
        Identity::new(format!("0xtrainer{i}"))
    }

    fn initialized(trainers: usize) -> RoundContract {
        let mut contract = RoundContract::new(owner());
        let init = Call::Initialize {
            genesis: "sha256:genesis".into(),
            total_rounds: 3,
            trainer_count: trainers,
        };
        contract.execute(&owner(), init).unwrap();

        let advance = Call::SubmitGlobalModel {
            round: 0,
            reference: "sha256:genesis".into(),
        };
        contract.execute(&owner(), advance).unwrap();
        contract
    }

    fn select(contract: &mut RoundContract, round: u64, trainers: Vec<Identity>) -> Outcome {
        contract.execute(&owner(), Call::SelectTrainers { round, trainers })
    }

    fn update(contract: &mut RoundContract, round: u64, from: &Identity, reference: &str) -> Outcome {
        let call = Call::SubmitUpdate {
            round,
            reference: reference.into(),
        };
        contract.execute(from, call)
    }

    #[test]
    fn genesis_round_advances_to_round_one() {
        let contract = initialized(2);

        assert_eq!(contract.current_round(), 1);
        assert_eq!(contract.global_model(0), "sha256:genesis");
        assert_eq!(contract.round_state(0), RoundState::Finalized);
        assert_eq!(contract.round_state(1), RoundState::Created);
    }

    #[test]
    fn second_initialization_reverts_without_overwriting() {
        let mut contract = initialized(2);
        let again = Call::Initialize {
            genesis: "sha256:other".into(),
            total_rounds: 9,
            trainer_count: 9,
        };

        assert!(matches!(
            contract.execute(&owner(), again),
            Err(Revert::StateConflict(_))
        ));
        assert_eq!(contract.task().genesis, "sha256:genesis");
        assert_eq!(contract.task().total_rounds, 3);
    }

    #[test]
    fn selection_is_fixed_once_written() {
        let mut contract = initialized(2);

        select(&mut contract, 1, vec![trainer(1), trainer(2)]).unwrap();
        select(&mut contract, 1, vec![trainer(1), trainer(2)]).unwrap();

        assert!(matches!(
            select(&mut contract, 1, vec![trainer(3), trainer(2)]),
            Err(Revert::StateConflict(_))
        ));
        assert_eq!(contract.selected_trainers(1), &[trainer(1), trainer(2)]);
    }

    #[test]
    fn selection_for_a_stale_round_conflicts() {
        let mut contract = initialized(1);

        assert!(matches!(
            select(&mut contract, 2, vec![trainer(1)]),
            Err(Revert::StateConflict(_))
        ));
    }

    #[test]
    fn updates_overwrite_and_require_selection() {
        let mut contract = initialized(1);
        select(&mut contract, 1, vec![trainer(1)]).unwrap();

        update(&mut contract, 1, &trainer(1), "sha256:a").unwrap();
        update(&mut contract, 1, &trainer(1), "sha256:b").unwrap();
        assert_eq!(contract.update(1, &trainer(1)), "sha256:b");
        assert_eq!(contract.round_state(1), RoundState::CollectingUpdates);

        assert_eq!(
            update(&mut contract, 1, &trainer(2), "sha256:c"),
            Err(Revert::Unauthorized(trainer(2)))
        );
    }

    #[test]
    fn rounds_only_move_forward() {
        let mut contract = initialized(1);
        select(&mut contract, 1, vec![trainer(1)]).unwrap();
        update(&mut contract, 1, &trainer(1), "sha256:a").unwrap();

        let global = Call::SubmitGlobalModel {
            round: 1,
            reference: "sha256:g1".into(),
        };
        contract.execute(&owner(), global.clone()).unwrap();
        assert_eq!(contract.current_round(), 2);
        assert_eq!(contract.round_state(1), RoundState::Aggregated);

        assert!(contract.execute(&owner(), global).is_err());
        assert!(update(&mut contract, 1, &trainer(1), "sha256:late").is_err());
        assert_eq!(contract.current_round(), 2);
    }

    #[test]
    fn scoring_every_update_marks_the_round_scored() {
        let mut contract = initialized(2);
        select(&mut contract, 1, vec![trainer(1), trainer(2)]).unwrap();
        update(&mut contract, 1, &trainer(1), "sha256:a").unwrap();

        let global = Call::SubmitGlobalModel {
            round: 1,
            reference: "sha256:g1".into(),
        };
        contract.execute(&owner(), global).unwrap();

        let bad = Call::SubmitScore {
            round: 1,
            trainer: trainer(1),
            score: 101,
        };
        assert_eq!(contract.execute(&owner(), bad), Err(Revert::InvalidScore(101)));

        let absent = Call::SubmitScore {
            round: 1,
            trainer: trainer(2),
            score: 10,
        };
        assert!(contract.execute(&owner(), absent).is_err());

        let good = Call::SubmitScore {
            round: 1,
            trainer: trainer(1),
            score: 87,
        };
        contract.execute(&owner(), good).unwrap();
        assert_eq!(contract.score(1, &trainer(1)), Some(87));
        assert_eq!(contract.score(1, &trainer(2)), None);
        assert_eq!(contract.round_state(1), RoundState::Scored);

        contract
            .execute(&owner(), Call::FinalizeRound { round: 1 })
            .unwrap();
        assert_eq!(contract.round_state(1), RoundState::Finalized);
    }

    #[test]
    fn closing_scoring_skips_unscored_updates() {
        let mut contract = initialized(2);
        select(&mut contract, 1, vec![trainer(1), trainer(2)]).unwrap();

        let early = Call::CloseScoring { round: 1 };
        assert!(matches!(
            contract.execute(&owner(), early),
            Err(Revert::StateConflict(_))
        ));

        update(&mut contract, 1, &trainer(1), "sha256:a").unwrap();
        update(&mut contract, 1, &trainer(2), "sha256:b").unwrap();

        let global = Call::SubmitGlobalModel {
            round: 1,
            reference: "sha256:g1".into(),
        };
        contract.execute(&owner(), global).unwrap();

        let score = Call::SubmitScore {
            round: 1,
            trainer: trainer(1),
            score: 60,
        };
        contract.execute(&owner(), score).unwrap();
        assert_eq!(contract.round_state(1), RoundState::Aggregated);

        assert_eq!(
            contract.execute(&trainer(1), Call::CloseScoring { round: 1 }),
            Err(Revert::Unauthorized(trainer(1)))
        );

        contract
            .execute(&owner(), Call::CloseScoring { round: 1 })
            .unwrap();
        contract
            .execute(&owner(), Call::CloseScoring { round: 1 })
            .unwrap();

        assert_eq!(contract.round_state(1), RoundState::Scored);
        assert_eq!(contract.score(1, &trainer(2)), None);
    }

    #[test]
    fn rewards_are_split_by_score_once() {
        let mut contract = initialized(2);
        select(&mut contract, 1, vec![trainer(1), trainer(2)]).unwrap();
        update(&mut contract, 1, &trainer(1), "sha256:a").unwrap();
        update(&mut contract, 1, &trainer(2), "sha256:b").unwrap();

        let global = Call::SubmitGlobalModel {
            round: 1,
            reference: "sha256:g1".into(),
        };
        contract.execute(&owner(), global).unwrap();

        for (i, score) in [(1, 75), (2, 25)] {
            let call = Call::SubmitScore {
                round: 1,
                trainer: trainer(i),
                score,
            };
            contract.execute(&owner(), call).unwrap();
        }

        let distribute = Call::DistributeTokens {
            round: 1,
            total_reward: 1000,
        };
        contract.execute(&owner(), distribute.clone()).unwrap();
        assert_eq!(contract.balance(&trainer(1)), 750);
        assert_eq!(contract.balance(&trainer(2)), 250);

        assert!(contract.execute(&owner(), distribute).is_err());
        assert_eq!(contract.balance(&trainer(1)), 750);
    }

    #[test]
    fn only_the_owner_drives_rounds() {
        let mut contract = initialized(1);

        assert_eq!(
            contract.execute(
                &trainer(1),
                Call::SelectTrainers {
                    round: 1,
                    trainers: vec![trainer(1)],
                },
            ),
            Err(Revert::Unauthorized(trainer(1)))
        );
    }
}
