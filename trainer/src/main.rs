use std::{io, process};

use blobstore::{BlobClient, TcpBlobs};
use clap::Parser;
use ledger::{ContractArtifact, RoundLedger, TcpTransport};
use log::{error, info, warn};
use model::{Dataset, LogisticModel};
use tokio::{net::TcpListener, signal};

use trainer::{TrainerAgent, TrainerArgs, TrainerService};

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();
    let args = TrainerArgs::parse();

    if let Err(e) = ContractArtifact::load(&args.abi) {
        eprintln!("trainer {}: {e}", args.id);
        process::exit(1);
    }

    let transport = TcpTransport::connect(args.url, &args.addr).await?;
    let ledger = RoundLedger::with_account_index(transport, args.account_idx).await?;
    let blobs = BlobClient::new(TcpBlobs::new(args.blob));

    let data = Dataset::synthetic(args.features, args.samples, args.id.wrapping_add(1));
    let model = LogisticModel::new(args.features)
        .with_config(args.train_config())
        .with_train_data(data);

    let agent = TrainerAgent::new(ledger, blobs, model);
    info!(trainer = agent.identity().as_str(); "trainer {} ready", args.id);
    let mut service = TrainerService::new(agent);

    let list = TcpListener::bind(args.listen).await?;
    info!("listening at {}", args.listen);

    loop {
        let (stream, addr) = tokio::select! {
            accepted = list.accept() => accepted?,
            _ = signal::ctrl_c() => {
                info!("received SIGTERM");
                return Ok(());
            }
        };

        info!("coordinator connected from {addr}");
        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);

        tokio::select! {
            ret = service.serve(rx, tx) => match ret {
                Ok(()) => info!("coordinator {addr} done"),
                Err(e) => error!("coordinator {addr} dropped: {e}"),
            },
            _ = signal::ctrl_c() => {
                warn!("received SIGTERM while serving {addr}");
                return Ok(());
            }
        }
    }
}
