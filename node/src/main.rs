use std::{fs, io, net::SocketAddr, path::PathBuf, time::Duration};

use blobstore::{BlobService, MemoryBlobs};
use clap::{Parser, Subcommand};
use ledger::{Chain, ContractArtifact, LedgerService, artifact::DEFAULT_ARTIFACT_PATH};
use log::{error, info};
use model::{LogisticModel, TrainableModel};
use tokio::{net::TcpListener, signal};

/// Local infrastructure for a federated training run.
#[derive(Debug, Parser)]
#[command(name = "node", version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Hosts the ledger, with the round contract deployed, and the blob store.
    Serve {
        #[arg(long, env = "LEDGER_LISTEN", default_value = "127.0.0.1:8545")]
        ledger: SocketAddr,

        #[arg(long, env = "BLOB_LISTEN", default_value = "127.0.0.1:5001")]
        blob: SocketAddr,

        /// Unlocked accounts, the first one owns the contract.
        #[arg(long, env = "ACCOUNTS", default_value_t = 10)]
        accounts: usize,

        /// Mines a block every this many milliseconds, 0 mines every transaction on arrival.
        #[arg(long, env = "BLOCK_MS", default_value_t = 0)]
        block_ms: u64,
    },

    /// Writes a randomly initialized model to use as the genesis model.
    Genesis {
        #[arg(long, default_value = "genesis.bin")]
        out: PathBuf,

        #[arg(long, default_value_t = 8)]
        features: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Writes the round contract's interface description.
    Artifact {
        #[arg(long, default_value = DEFAULT_ARTIFACT_PATH)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    match Args::parse().command {
        Commands::Serve {
            ledger,
            blob,
            accounts,
            block_ms,
        } => serve(ledger, blob, accounts, block_ms).await,
        Commands::Genesis {
            out,
            features,
            seed,
        } => {
            let bytes = LogisticModel::random(features, seed).save_bytes();
            fs::write(&out, bytes)?;
            println!("genesis model with {features} features written to {}", out.display());
            Ok(())
        }
        Commands::Artifact { out } => {
            ContractArtifact::round_contract().write(&out)?;
            println!("contract artifact written to {}", out.display());
            Ok(())
        }
    }
}

async fn serve(ledger: SocketAddr, blob: SocketAddr, accounts: usize, block_ms: u64) -> io::Result<()> {
    let mut chain = Chain::new(accounts);
    chain.set_auto_mine(block_ms == 0);

    println!("contract address: {}", chain.address());
    for (i, account) in chain.accounts().iter().enumerate() {
        println!("account {i}: {account}");
    }

    let ledger_service = LedgerService::new(chain);
    let blob_service = BlobService::new(MemoryBlobs::new());

    let ledger_listener = TcpListener::bind(ledger).await?;
    let blob_listener = TcpListener::bind(blob).await?;

    if block_ms > 0 {
        let producer = ledger_service.clone();
        let interval = Duration::from_millis(block_ms);
        info!(block_ms = block_ms; "producing blocks");
        tokio::spawn(async move { producer.produce_blocks(interval).await });
    }

    tokio::select! {
        ret = ledger_service.serve(ledger_listener) => {
            if let Err(e) = &ret {
                error!("ledger stopped: {e}");
            }
            ret
        }
        ret = blob_service.serve(blob_listener) => {
            if let Err(e) = &ret {
                error!("blob store stopped: {e}");
            }
            ret
        }
        _ = signal::ctrl_c() => {
            info!("received SIGTERM");
            Ok(())
        }
    }
}
