use std::{fs, io, process};

use blobstore::{BlobClient, TcpBlobs};
use clap::Parser;
use coordinator::{Coordinator, CoordinatorArgs, RemoteParticipant, TrainerSampler};
use ledger::{ContractArtifact, RoundLedger, TcpTransport};
use log::{info, warn};
use model::LogisticModel;
use rand::{SeedableRng, rngs::StdRng};

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();
    let args = CoordinatorArgs::parse();

    if let Err(e) = ContractArtifact::load(&args.abi) {
        eprintln!("coordinator: {e}");
        process::exit(1);
    }

    let initial = match fs::read(&args.path) {
        Ok(initial) => initial,
        Err(e) => {
            eprintln!(
                "coordinator: can't read the initial model at {}: {e}",
                args.path.display()
            );
            process::exit(1);
        }
    };

    let transport = TcpTransport::connect(args.url, &args.addr).await?;
    let ledger = RoundLedger::with_account_index(transport, 0)
        .await?
        .with_rewards(args.rewards > 0);
    let blobs = BlobClient::new(TcpBlobs::new(args.blob));
    let sampler = TrainerSampler::new(StdRng::seed_from_u64(args.seed));
    let model = LogisticModel::new(args.features);

    let mut coordinator = Coordinator::new(ledger, blobs, model, sampler, args.config());

    for addr in &args.trainers {
        match RemoteParticipant::connect(addr).await {
            Ok(participant) => coordinator.register(participant),
            Err(e) => warn!("couldn't reach trainer at {addr}: {e}"),
        }
    }

    let genesis = coordinator.bootstrap(&initial).await?;
    info!(genesis = genesis.as_str(); "bootstrapped");

    let outcomes = coordinator.run().await;

    for mut participant in coordinator.into_participants() {
        if let Err(e) = participant.disconnect().await {
            warn!("failed to disconnect a trainer: {e}");
        }
    }

    for outcome in outcomes? {
        info!(
            round = outcome.round,
            updates = outcome.aggregated.len(),
            global = outcome.global.as_str();
            "round {} ended {}",
            outcome.round,
            outcome.state
        );
    }

    Ok(())
}
