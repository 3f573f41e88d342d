use std::fmt;

use serde::{Deserialize, Serialize};

use super::Identity;

/// The lifecycle of a single training round as recorded by the ledger.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    #[default]
    Created,
    TrainersSelected,
    CollectingUpdates,
    Aggregated,
    Scored,
    Finalized,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoundState::Created => "created",
            RoundState::TrainersSelected => "trainers_selected",
            RoundState::CollectingUpdates => "collecting_updates",
            RoundState::Aggregated => "aggregated",
            RoundState::Scored => "scored",
            RoundState::Finalized => "finalized",
        };

        f.write_str(s)
    }
}

/// Process wide training configuration, fixed at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskInfo {
    pub genesis: String,
    pub total_rounds: u64,
    pub trainer_count: usize,
    pub initialized: bool,
}

/// A transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub u64);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Proof that a mutating call was included in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx: TxId,
    pub block: u64,
}

/// Why the contract refused to apply a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Revert {
    StateConflict(String),
    InvalidScore(u32),
    Unauthorized(Identity),
    NotInitialized,
}

/// The result of executing a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxOutcome {
    Confirmed,
    Reverted(Revert),
}

/// A mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub receipt: Receipt,
    pub outcome: TxOutcome,
}

/// Read-only contract calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// Whether a contract is deployed at `address`.
    Code { address: String },
    Task,
    CurrentRound,
    GlobalModel { round: u64 },
    SelectedTrainers { round: u64 },
    Update { round: u64, trainer: Identity },
    Score { round: u64, trainer: Identity },
    RoundState { round: u64 },
    Balance { account: Identity },
    Accounts,
}

/// Answers to the `Query` calls, one variant per kind of value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Deployed(bool),
    Task(TaskInfo),
    Round(u64),
    /// A possibly empty content reference.
    Reference(String),
    Trainers(Vec<Identity>),
    Score(Option<u8>),
    State(RoundState),
    Balance(u64),
    Accounts(Vec<Identity>),
}

/// State mutating contract calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Call {
    Initialize {
        genesis: String,
        total_rounds: u64,
        trainer_count: usize,
    },
    SelectTrainers {
        round: u64,
        trainers: Vec<Identity>,
    },
    SubmitUpdate {
        round: u64,
        reference: String,
    },
    SubmitGlobalModel {
        round: u64,
        reference: String,
    },
    SubmitScore {
        round: u64,
        trainer: Identity,
        score: u32,
    },
    /// Marks an aggregated round scored, even if some updates never got a score.
    CloseScoring {
        round: u64,
    },
    FinalizeRound {
        round: u64,
    },
    DistributeTokens {
        round: u64,
        total_reward: u64,
    },
}

impl Call {
    /// The contract function this call maps to.
    pub fn name(&self) -> &'static str {
        match self {
            Call::Initialize { .. } => "initialize",
            Call::SelectTrainers { .. } => "selectTrainersForRound",
            Call::SubmitUpdate { .. } => "submitUpdate",
            Call::SubmitGlobalModel { .. } => "submitGlobalModel",
            Call::SubmitScore { .. } => "submitScore",
            Call::CloseScoring { .. } => "closeScoring",
            Call::FinalizeRound { .. } => "finalizeRound",
            Call::DistributeTokens { .. } => "distributeTokens",
        }
    }
}
