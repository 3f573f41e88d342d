use blobstore::{BlobClient, MemoryBlobs};
use comms::specs::{ContentRef, Identity, fit::FitIns};
use ledger::{MemoryTransport, RoundLedger};
use model::{Dataset, LogisticModel, TrainableModel};
use trainer::{Contribution, TrainerAgent, TrainerErr};

const FEATURES: usize = 3;

struct Fixture {
    ledger: MemoryTransport,
    blobs: MemoryBlobs,
    owner: RoundLedger<MemoryTransport>,
    genesis: ContentRef,
}

impl Fixture {
    async fn new() -> Self {
        let ledger = MemoryTransport::new(4);
        let blobs = MemoryBlobs::new();
        let owner = RoundLedger::new(ledger.clone(), ledger.accounts()[0].clone());

        let initial = LogisticModel::new(FEATURES).save_bytes();
        let genesis = BlobClient::new(blobs.clone()).put(&initial).await.unwrap();
        owner.initialize(&genesis, 3, 2).await.unwrap();
        owner.submit_global_model(0, &genesis).await.unwrap();

        Self {
            ledger,
            blobs,
            owner,
            genesis,
        }
    }

    fn trainer(&self, idx: usize) -> Identity {
        self.ledger.accounts()[idx].clone()
    }

    fn agent(&self, idx: usize) -> TrainerAgent<MemoryTransport, MemoryBlobs, LogisticModel> {
        let ledger = RoundLedger::new(self.ledger.clone(), self.trainer(idx));
        let blobs = BlobClient::new(self.blobs.clone());
        let model = LogisticModel::new(FEATURES)
            .with_train_data(Dataset::synthetic(FEATURES, 64, idx as u64));

        TrainerAgent::new(ledger, blobs, model)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn selected_trainer_submits_from_genesis() {
    let fx = Fixture::new().await;
    fx.owner
        .select_trainers(1, &[fx.trainer(1), fx.trainer(2)])
        .await
        .unwrap();

    let mut agent = fx.agent(1);
    let Contribution::Submitted {
        round, reference, ..
    } = agent.fit(FitIns { round: 1 }).await
    else {
        panic!("trainer should have submitted");
    };

    assert_eq!(round, 1);
    assert_ne!(reference, fx.genesis);
    assert_eq!(
        fx.owner.update_of(1, &fx.trainer(1)).await.unwrap(),
        Some(reference.clone())
    );

    let stored = BlobClient::new(fx.blobs.clone()).get(&reference).await.unwrap();
    assert_eq!(stored, agent.model().save_bytes());
}

#[tokio::test(flavor = "multi_thread")]
async fn unselected_trainer_sits_out() {
    let fx = Fixture::new().await;
    fx.owner.select_trainers(1, &[fx.trainer(1)]).await.unwrap();

    let contribution = fx.agent(3).fit(FitIns { round: 1 }).await;

    assert!(matches!(
        contribution,
        Contribution::Absent {
            round: 1,
            reason: TrainerErr::NotSelected { round: 1 }
        }
    ));
    assert_eq!(fx.owner.update_of(1, &fx.trainer(3)).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_instruction_is_a_round_mismatch() {
    let fx = Fixture::new().await;

    let contribution = fx.agent(1).fit(FitIns { round: 2 }).await;

    assert!(matches!(
        contribution,
        Contribution::Absent {
            reason: TrainerErr::RoundMismatch {
                instructed: 2,
                current: 1
            },
            ..
        }
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn lost_global_model_is_reported_not_fatal() {
    let fx = Fixture::new().await;
    fx.owner.select_trainers(1, &[fx.trainer(1)]).await.unwrap();
    fx.blobs.remove(&fx.genesis);

    let contribution = fx.agent(1).fit(FitIns { round: 1 }).await;

    let res = contribution.to_fit_res();
    assert_eq!(res.round, 1);
    assert!(res.reference.is_none());
    assert!(res.error.is_some());
}
