use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use ledger::artifact::DEFAULT_ARTIFACT_PATH;
use model::TrainConfig;

/// Trains the global model on local data whenever a coordinator asks for it.
#[derive(Debug, Clone, Parser)]
#[command(name = "trainer", version)]
pub struct TrainerArgs {
    /// Identifier of this trainer, also seeds its local data.
    #[arg(long, env = "TRAINER_ID")]
    pub id: u64,

    /// Address of the ledger node.
    #[arg(long, env = "LEDGER_URL", default_value = "127.0.0.1:8545")]
    pub url: SocketAddr,

    /// Address the round contract is deployed at.
    #[arg(long, env = "CONTRACT_ADDRESS")]
    pub addr: String,

    /// Which of the node's accounts signs this trainer's transactions.
    #[arg(long, env = "ACCOUNT_IDX")]
    pub account_idx: usize,

    /// Address of the blob store.
    #[arg(long, env = "BLOB_URL", default_value = "127.0.0.1:5001")]
    pub blob: SocketAddr,

    /// Where to wait for the coordinator.
    #[arg(long, env = "TRAINER_LISTEN", default_value = "127.0.0.1:7000")]
    pub listen: SocketAddr,

    #[arg(long, env = "CONTRACT_ABI", default_value = DEFAULT_ARTIFACT_PATH)]
    pub abi: PathBuf,

    #[arg(long, env = "FEATURES", default_value_t = 8)]
    pub features: usize,

    /// Amount of private training samples.
    #[arg(long, env = "SAMPLES", default_value_t = 256)]
    pub samples: usize,

    #[arg(long, env = "EPOCHS", default_value_t = 5)]
    pub epochs: usize,
}

impl TrainerArgs {
    /// The local update hyperparameters, seeded by this trainer's id.
    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            epochs: self.epochs,
            seed: self.id,
            ..TrainConfig::default()
        }
    }
}
