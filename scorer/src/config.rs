use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use ledger::artifact::DEFAULT_ARTIFACT_PATH;

/// Scores every trainer update of the aggregated rounds against a held out dataset.
#[derive(Debug, Clone, Parser)]
#[command(name = "scorer", version)]
pub struct ScorerArgs {
    #[arg(long, env = "LEDGER_URL", default_value = "127.0.0.1:8545")]
    pub url: SocketAddr,

    #[arg(long, env = "CONTRACT_ADDRESS")]
    pub addr: String,

    #[arg(long, env = "BLOB_URL", default_value = "127.0.0.1:5001")]
    pub blob: SocketAddr,

    #[arg(long, env = "CONTRACT_ABI", default_value = DEFAULT_ARTIFACT_PATH)]
    pub abi: PathBuf,

    /// The account allowed to record scores, the contract owner.
    #[arg(long, env = "ACCOUNT_IDX", default_value_t = 0)]
    pub account_idx: usize,

    /// Score this round once and exit instead of watching the ledger.
    #[arg(long, env = "ROUND")]
    pub round: Option<u64>,

    #[arg(long, env = "POLL_MS", default_value_t = 500)]
    pub poll_ms: u64,

    #[arg(long, env = "FEATURES", default_value_t = 8)]
    pub features: usize,

    /// Size of the held out evaluation dataset.
    #[arg(long, env = "SAMPLES", default_value_t = 512)]
    pub samples: usize,

    #[arg(long, env = "SEED", default_value_t = 0)]
    pub seed: u64,
}
