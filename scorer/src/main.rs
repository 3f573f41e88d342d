use std::{io, process, time::Duration};

use blobstore::{BlobClient, TcpBlobs};
use clap::Parser;
use ledger::{ContractArtifact, RoundLedger, TcpTransport};
use log::{info, warn};
use model::{Dataset, LogisticModel};
use tokio::signal;

use scorer::{ScorerArgs, ScoringAgent};

/// Keeps the evaluation samples away from any trainer's private data.
const HOLDOUT_OFFSET: u64 = 10_000;

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();
    let args = ScorerArgs::parse();

    if let Err(e) = ContractArtifact::load(&args.abi) {
        eprintln!("scorer: {e}");
        process::exit(1);
    }

    let transport = TcpTransport::connect(args.url, &args.addr).await?;
    let ledger = RoundLedger::with_account_index(transport, args.account_idx).await?;
    let blobs = BlobClient::new(TcpBlobs::new(args.blob));

    let holdout = Dataset::synthetic(
        args.features,
        args.samples,
        args.seed.wrapping_add(HOLDOUT_OFFSET),
    );
    let model = LogisticModel::new(args.features).with_test_data(holdout);
    let mut agent = ScoringAgent::new(ledger, blobs, model);

    if let Some(round) = args.round {
        let report = agent.score_round(round).await?;
        for (trainer, score) in &report.scored {
            info!(round = round, trainer = trainer.as_str(), score = *score; "scored");
        }
        for (trainer, e) in &report.failed {
            warn!(round = round, trainer = trainer.as_str(); "failed: {e}");
        }

        return Ok(());
    }

    tokio::select! {
        ret = agent.watch(Duration::from_millis(args.poll_ms)) => ret?,
        _ = signal::ctrl_c() => info!("received SIGTERM"),
    }

    Ok(())
}
