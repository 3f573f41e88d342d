use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use ledger::artifact::DEFAULT_ARTIFACT_PATH;

/// The knobs of a training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Rounds to train, fixed at genesis.
    pub total_rounds: u64,
    /// Trainers selected per round, fixed at genesis.
    pub trainer_count: usize,
    /// How long selected trainers have to answer a fit instruction.
    pub round_deadline: Duration,
    /// How long to wait for the scorer before leaving a round aggregated.
    pub scoring_deadline: Duration,
    pub scoring_poll: Duration,
    /// Tokens split among the trainers of every scored round.
    pub total_reward: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            total_rounds: 1,
            trainer_count: 1,
            round_deadline: Duration::from_secs(60),
            scoring_deadline: Duration::from_secs(120),
            scoring_poll: Duration::from_millis(200),
            total_reward: 0,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_rounds(mut self, total_rounds: u64) -> Self {
        self.total_rounds = total_rounds;
        self
    }

    pub fn with_trainer_count(mut self, trainer_count: usize) -> Self {
        self.trainer_count = trainer_count;
        self
    }

    pub fn with_round_deadline(mut self, deadline: Duration) -> Self {
        self.round_deadline = deadline;
        self
    }

    pub fn with_scoring_deadline(mut self, deadline: Duration) -> Self {
        self.scoring_deadline = deadline;
        self
    }

    pub fn with_scoring_poll(mut self, poll: Duration) -> Self {
        self.scoring_poll = poll;
        self
    }

    pub fn with_total_reward(mut self, total_reward: u64) -> Self {
        self.total_reward = total_reward;
        self
    }
}

/// Drives the training rounds of a federated task anchored on the ledger.
#[derive(Debug, Clone, Parser)]
#[command(name = "coordinator", version)]
pub struct CoordinatorArgs {
    /// Trainers selected per round.
    #[arg(long, env = "CLIENTS")]
    pub clients: usize,

    #[arg(long, env = "ROUNDS")]
    pub rounds: u64,

    /// Address of the ledger node.
    #[arg(long, env = "LEDGER_URL", default_value = "127.0.0.1:8545")]
    pub url: SocketAddr,

    /// Address the round contract is deployed at.
    #[arg(long, env = "CONTRACT_ADDRESS")]
    pub addr: String,

    /// The initial model, published as round 0's global model.
    #[arg(long, env = "MODEL_PATH")]
    pub path: PathBuf,

    /// Addresses of the trainers to register, repeat the flag for each one.
    #[arg(long = "trainer", env = "TRAINERS", value_delimiter = ',')]
    pub trainers: Vec<SocketAddr>,

    #[arg(long, env = "BLOB_URL", default_value = "127.0.0.1:5001")]
    pub blob: SocketAddr,

    #[arg(long, env = "CONTRACT_ABI", default_value = DEFAULT_ARTIFACT_PATH)]
    pub abi: PathBuf,

    #[arg(long, env = "DEADLINE_SECS", default_value_t = 60)]
    pub deadline_secs: u64,

    #[arg(long, env = "SCORING_SECS", default_value_t = 120)]
    pub scoring_secs: u64,

    /// Seeds the trainer selection.
    #[arg(long, env = "SEED", default_value_t = 0)]
    pub seed: u64,

    /// Tokens to split among the trainers of every round, 0 disables rewards.
    #[arg(long, env = "REWARDS", default_value_t = 0)]
    pub rewards: u64,

    #[arg(long, env = "FEATURES", default_value_t = 8)]
    pub features: usize,
}

impl CoordinatorArgs {
    pub fn config(&self) -> CoordinatorConfig {
        CoordinatorConfig::default()
            .with_rounds(self.rounds)
            .with_trainer_count(self.clients)
            .with_round_deadline(Duration::from_secs(self.deadline_secs))
            .with_scoring_deadline(Duration::from_secs(self.scoring_secs))
            .with_total_reward(self.rewards)
    }
}
