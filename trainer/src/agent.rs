use blobstore::{BlobClient, BlobTransport};
use comms::specs::{
    ContentRef, Identity,
    fit::{FitIns, FitRes},
    ledger::Receipt,
};
use ledger::{LedgerTransport, RoundLedger};
use log::{debug, info, warn};
use model::TrainableModel;
use tokio::task;

use crate::{Result, TrainerErr};

/// What a trainer did with a fit instruction.
#[derive(Debug)]
pub enum Contribution {
    Submitted {
        round: u64,
        reference: ContentRef,
        receipt: Receipt,
    },
    Absent {
        round: u64,
        reason: TrainerErr,
    },
}

impl Contribution {
    pub fn round(&self) -> u64 {
        match self {
            Contribution::Submitted { round, .. } | Contribution::Absent { round, .. } => *round,
        }
    }

    /// The reply sent back to the coordinator.
    pub fn to_fit_res(&self) -> FitRes {
        match self {
            Contribution::Submitted {
                round, reference, ..
            } => FitRes::submitted(*round, reference.as_str()),
            Contribution::Absent { round, reason } => FitRes::absent(*round, reason.to_string()),
        }
    }
}

/// A participant that trains the global model on its private data.
pub struct TrainerAgent<L, B, M>
where
    L: LedgerTransport,
    B: BlobTransport,
    M: TrainableModel,
{
    ledger: RoundLedger<L>,
    blobs: BlobClient<B>,
    model: M,
}

impl<L, B, M> TrainerAgent<L, B, M>
where
    L: LedgerTransport,
    B: BlobTransport,
    M: TrainableModel,
{
    /// Creates a new `TrainerAgent`.
    ///
    /// # Arguments
    /// * `ledger` - The ledger client, signing with this trainer's account.
    /// * `blobs` - The blob exchange client.
    /// * `model` - The local model, already holding the private training data.
    ///
    /// # Returns
    /// A new `TrainerAgent` instance.
    pub fn new(ledger: RoundLedger<L>, blobs: BlobClient<B>, model: M) -> Self {
        Self {
            ledger,
            blobs,
            model,
        }
    }

    /// The account this trainer submits updates with.
    pub fn identity(&self) -> &Identity {
        self.ledger.account()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Trains the round in `ins` and submits the resulting update.
    ///
    /// Never fails, any error is logged and reported as an `Absent` contribution.
    pub async fn fit(&mut self, ins: FitIns) -> Contribution {
        let round = ins.round;

        match self.train(round).await {
            Ok((reference, receipt)) => {
                info!(
                    round = round,
                    trainer = self.identity().as_str(),
                    block = receipt.block;
                    "update submitted"
                );

                Contribution::Submitted {
                    round,
                    reference,
                    receipt,
                }
            }
            Err(reason) => {
                warn!(round = round, trainer = self.identity().as_str(); "sitting out: {reason}");
                Contribution::Absent { round, reason }
            }
        }
    }

    async fn train(&mut self, round: u64) -> Result<(ContentRef, Receipt)> {
        let current = self.ledger.current_round().await?;
        if current != round {
            return Err(TrainerErr::RoundMismatch {
                instructed: round,
                current,
            });
        }

        let selected = self.ledger.selected_trainers(round).await?;
        if !selected.contains(self.identity()) {
            return Err(TrainerErr::NotSelected { round });
        }

        let base = round
            .checked_sub(1)
            .ok_or(TrainerErr::MissingGlobalModel { round })?;

        let global = self
            .ledger
            .global_model_ref(base)
            .await?
            .ok_or(TrainerErr::MissingGlobalModel { round: base })?;

        debug!(round = round, base = global.as_str(); "downloading global model");
        let bytes = self.blobs.fetch(&global).await?;

        let model = &mut self.model;
        let update = task::block_in_place(|| -> Result<Vec<u8>> {
            model.load_bytes(&bytes)?;
            let loss = model.local_update()?;
            debug!(round = round, loss = loss; "local update done");
            Ok(model.save_bytes())
        })?;

        let reference = self.blobs.put(&update).await?;
        let receipt = self.ledger.submit_update(round, &reference).await?;
        Ok((reference, receipt))
    }
}
