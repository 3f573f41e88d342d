use std::time::Duration;

use blobstore::{BlobClient, MemoryBlobs};
use comms::specs::{ContentRef, Identity, ledger::RoundState};
use ledger::{MemoryTransport, RoundLedger};
use model::{Dataset, LogisticModel, TrainableModel};
use scorer::{ScorerErr, ScoringAgent};

const FEATURES: usize = 3;

struct Fixture {
    ledger: MemoryTransport,
    blobs: MemoryBlobs,
    owner: RoundLedger<MemoryTransport>,
}

impl Fixture {
    /// A task of `rounds` rounds with round 1 open and trainers 1 and 2 selected.
    async fn new(rounds: u64) -> Self {
        let ledger = MemoryTransport::new(4);
        let blobs = MemoryBlobs::new();
        let owner = RoundLedger::new(ledger.clone(), ledger.accounts()[0].clone());

        let initial = LogisticModel::new(FEATURES).save_bytes();
        let genesis = BlobClient::new(blobs.clone()).put(&initial).await.unwrap();
        owner.initialize(&genesis, rounds, 2).await.unwrap();
        owner.submit_global_model(0, &genesis).await.unwrap();

        let fx = Self {
            ledger,
            blobs,
            owner,
        };
        fx.select(1).await;
        fx
    }

    async fn select(&self, round: u64) {
        self.owner
            .select_trainers(round, &[self.trainer(1), self.trainer(2)])
            .await
            .unwrap();
    }

    fn trainer(&self, idx: usize) -> Identity {
        trainer(&self.ledger, idx)
    }

    async fn submit(&self, idx: usize, bytes: &[u8]) -> ContentRef {
        self.submit_to(1, idx, bytes).await
    }

    async fn submit_to(&self, round: u64, idx: usize, bytes: &[u8]) -> ContentRef {
        let reference = BlobClient::new(self.blobs.clone()).put(bytes).await.unwrap();
        RoundLedger::new(self.ledger.clone(), self.trainer(idx))
            .submit_update(round, &reference)
            .await
            .unwrap();
        reference
    }

    async fn aggregate(&self, round: u64) -> ContentRef {
        let bytes = LogisticModel::random(FEATURES, round).save_bytes();
        let global = BlobClient::new(self.blobs.clone()).put(&bytes).await.unwrap();
        self.owner.submit_global_model(round, &global).await.unwrap();
        global
    }

    fn scorer(&self) -> ScoringAgent<MemoryTransport, MemoryBlobs, LogisticModel> {
        let ledger = RoundLedger::new(self.ledger.clone(), self.trainer(0));
        let model = LogisticModel::new(FEATURES)
            .with_test_data(Dataset::synthetic(FEATURES, 128, 10_000));

        ScoringAgent::new(ledger, BlobClient::new(self.blobs.clone()), model)
    }
}

fn trainer(ledger: &MemoryTransport, idx: usize) -> Identity {
    ledger.accounts()[idx].clone()
}

fn trained(seed: u64) -> Vec<u8> {
    let mut model = LogisticModel::new(FEATURES)
        .with_train_data(Dataset::synthetic(FEATURES, 128, seed));
    model.local_update().unwrap();
    model.save_bytes()
}

#[tokio::test(flavor = "multi_thread")]
async fn every_update_is_scored() {
    let fx = Fixture::new(1).await;
    fx.submit(1, &trained(1)).await;
    fx.submit(2, &trained(2)).await;
    fx.aggregate(1).await;

    let report = fx.scorer().score_round(1).await.unwrap();

    assert_eq!(report.scored.len(), 2);
    assert!(report.absent.is_empty());
    assert!(report.failed.is_empty());

    for (trainer, score) in &report.scored {
        assert!(*score <= 100);
        let recorded = fx.owner.score_of(1, trainer).await.unwrap();
        assert_eq!(recorded, Some(*score as u8));
    }

    assert_eq!(fx.owner.round_state(1).await.unwrap(), RoundState::Scored);
}

#[tokio::test(flavor = "multi_thread")]
async fn open_round_is_not_scored() {
    let fx = Fixture::new(1).await;
    fx.submit(1, &trained(1)).await;

    let err = fx.scorer().score_round(1).await.unwrap_err();
    assert!(matches!(err, ScorerErr::RoundNotAggregated { round: 1, .. }));
    assert_eq!(fx.owner.score_of(1, &fx.trainer(1)).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn trainers_without_update_are_absent() {
    let fx = Fixture::new(1).await;
    fx.submit(1, &trained(1)).await;
    fx.aggregate(1).await;

    let report = fx.scorer().score_round(1).await.unwrap();

    assert_eq!(report.scored.len(), 1);
    assert_eq!(report.absent, vec![fx.trainer(2)]);
    assert_eq!(fx.owner.round_state(1).await.unwrap(), RoundState::Scored);
}

#[tokio::test(flavor = "multi_thread")]
async fn unusable_update_is_skipped_without_a_score() {
    let fx = Fixture::new(1).await;
    fx.submit(1, b"definitely not a model").await;
    fx.submit(2, &trained(2)).await;
    fx.aggregate(1).await;

    let report = fx.scorer().score_round(1).await.unwrap();

    assert_eq!(report.scored.len(), 1);
    assert_eq!(report.scored[0].0, fx.trainer(2));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, fx.trainer(1));
    assert!(matches!(report.failed[0].1, ScorerErr::Model(_)));
    assert!(report.closed);

    assert_eq!(fx.owner.score_of(1, &fx.trainer(1)).await.unwrap(), None);
    assert!(fx.owner.score_of(1, &fx.trainer(2)).await.unwrap().is_some());
    assert_eq!(fx.owner.round_state(1).await.unwrap(), RoundState::Scored);
}

#[tokio::test(flavor = "multi_thread")]
async fn round_without_updates_is_closed() {
    let fx = Fixture::new(1).await;
    fx.aggregate(1).await;

    let report = fx.scorer().score_round(1).await.unwrap();

    assert!(report.scored.is_empty());
    assert_eq!(report.absent.len(), 2);
    assert!(report.closed);
    assert_eq!(fx.owner.round_state(1).await.unwrap(), RoundState::Scored);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_update_is_retried_on_the_next_pass() {
    let fx = Fixture::new(1).await;
    let bytes = trained(1);
    let lost = fx.submit(1, &bytes).await;
    fx.submit(2, &trained(2)).await;
    fx.aggregate(1).await;
    assert!(fx.blobs.remove(lost.as_str()));

    let mut scorer = fx.scorer();
    let report = scorer.score_round(1).await.unwrap();

    assert_eq!(report.scored.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, fx.trainer(1));
    assert!(matches!(report.failed[0].1, ScorerErr::Blob(_)));
    assert!(!report.closed);
    assert_eq!(fx.owner.round_state(1).await.unwrap(), RoundState::Aggregated);

    BlobClient::new(fx.blobs.clone()).put(&bytes).await.unwrap();
    let report = scorer.score_round(1).await.unwrap();

    assert_eq!(report.scored.len(), 1);
    assert_eq!(report.scored[0].0, fx.trainer(1));
    assert_eq!(fx.owner.round_state(1).await.unwrap(), RoundState::Scored);
}

#[tokio::test(flavor = "multi_thread")]
async fn global_model_is_evaluated_without_writing() {
    let fx = Fixture::new(1).await;
    fx.submit(1, &trained(1)).await;
    fx.aggregate(1).await;

    let mut scorer = fx.scorer();
    let accuracy = scorer.evaluate_global(1).await.unwrap();

    assert!((0.0..=1.0).contains(&accuracy));
    assert_eq!(fx.owner.score_of(1, &fx.trainer(1)).await.unwrap(), None);

    let err = scorer.evaluate_global(5).await.unwrap_err();
    assert!(matches!(err, ScorerErr::MissingGlobalModel { round: 5 }));
}

#[tokio::test(flavor = "multi_thread")]
async fn watch_stops_once_the_last_round_is_scored() {
    let fx = Fixture::new(1).await;
    fx.submit(1, &trained(1)).await;
    fx.submit(2, &trained(2)).await;

    let mut scorer = fx.scorer();
    let watcher = tokio::spawn(async move { scorer.watch(Duration::from_millis(10)).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!watcher.is_finished());

    fx.aggregate(1).await;

    tokio::time::timeout(Duration::from_secs(5), watcher)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(fx.owner.round_state(1).await.unwrap(), RoundState::Scored);
}

#[tokio::test(flavor = "multi_thread")]
async fn lost_update_does_not_hold_back_later_rounds() {
    let _ = env_logger::builder().is_test(true).try_init();

    let fx = Fixture::new(2).await;
    fx.submit_to(1, 1, &trained(1)).await;
    let lost = fx.submit_to(1, 2, &trained(2)).await;
    fx.aggregate(1).await;
    assert!(fx.blobs.remove(lost.as_str()));

    fx.select(2).await;
    fx.submit_to(2, 1, &trained(3)).await;
    fx.submit_to(2, 2, &trained(4)).await;
    fx.aggregate(2).await;

    let mut scorer = fx.scorer();
    tokio::time::timeout(Duration::from_secs(5), scorer.watch(Duration::from_millis(10)))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(fx.owner.round_state(2).await.unwrap(), RoundState::Scored);
    assert!(fx.owner.score_of(2, &fx.trainer(1)).await.unwrap().is_some());
    assert!(fx.owner.score_of(2, &fx.trainer(2)).await.unwrap().is_some());

    assert_eq!(fx.owner.round_state(1).await.unwrap(), RoundState::Scored);
    assert!(fx.owner.score_of(1, &fx.trainer(1)).await.unwrap().is_some());
    assert_eq!(fx.owner.score_of(1, &fx.trainer(2)).await.unwrap(), None);
}
