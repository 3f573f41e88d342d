use std::{io, time::Duration};

use blobstore::{BlobClient, MemoryBlobs, content_ref};
use comms::specs::{
    Identity,
    fit::{FitIns, FitRes},
    ledger::RoundState,
};
use coordinator::{Coordinator, CoordinatorConfig, CoordinatorErr, Participant, TrainerSampler};
use ledger::{MemoryTransport, RoundLedger};
use model::{Dataset, LogisticModel, TrainableModel};
use rand::{SeedableRng, rngs::StdRng};
use scorer::ScoringAgent;
use trainer::TrainerAgent;

const FEATURES: usize = 4;

type Agent = TrainerAgent<MemoryTransport, MemoryBlobs, LogisticModel>;
type TestCoordinator = Coordinator<MemoryTransport, MemoryBlobs, LogisticModel, TestTrainer, StdRng>;

/// A trainer running in the test process.
struct TestTrainer {
    identity: Identity,
    /// `None` answers every instruction with an update nobody stored.
    agent: Option<Agent>,
    delay: Duration,
}

impl TestTrainer {
    fn late(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Participant for TestTrainer {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn fit(&mut self, ins: FitIns) -> io::Result<FitRes> {
        tokio::time::sleep(self.delay).await;

        match &mut self.agent {
            Some(agent) => Ok(agent.fit(ins).await.to_fit_res()),
            None => Ok(FitRes::submitted(ins.round, content_ref(b"never uploaded"))),
        }
    }
}

struct Network {
    ledger: MemoryTransport,
    blobs: MemoryBlobs,
}

impl Network {
    fn new() -> Self {
        Self {
            ledger: MemoryTransport::new(6),
            blobs: MemoryBlobs::new(),
        }
    }

    fn account(&self, idx: usize) -> Identity {
        self.ledger.accounts()[idx].clone()
    }

    fn owner(&self) -> RoundLedger<MemoryTransport> {
        RoundLedger::new(self.ledger.clone(), self.account(0))
    }

    fn honest(&self, idx: usize) -> TestTrainer {
        let ledger = RoundLedger::new(self.ledger.clone(), self.account(idx));
        let model = LogisticModel::new(FEATURES)
            .with_train_data(Dataset::synthetic(FEATURES, 96, idx as u64 + 1));
        let agent = TrainerAgent::new(ledger, BlobClient::new(self.blobs.clone()), model);

        TestTrainer {
            identity: self.account(idx),
            agent: Some(agent),
            delay: Duration::ZERO,
        }
    }

    fn bogus(&self, idx: usize) -> TestTrainer {
        TestTrainer {
            identity: self.account(idx),
            agent: None,
            delay: Duration::ZERO,
        }
    }

    fn coordinator(&self, config: CoordinatorConfig) -> TestCoordinator {
        Coordinator::new(
            self.owner().with_rewards(config.total_reward > 0),
            BlobClient::new(self.blobs.clone()),
            LogisticModel::new(FEATURES),
            TrainerSampler::new(StdRng::seed_from_u64(7)),
            config,
        )
    }

    fn spawn_scorer(&self) -> tokio::task::JoinHandle<scorer::Result<()>> {
        let model = LogisticModel::new(FEATURES)
            .with_test_data(Dataset::synthetic(FEATURES, 256, 10_000));
        let mut agent = ScoringAgent::new(self.owner(), BlobClient::new(self.blobs.clone()), model);

        tokio::spawn(async move { agent.watch(Duration::from_millis(10)).await })
    }
}

fn config(rounds: u64, trainers: usize) -> CoordinatorConfig {
    CoordinatorConfig::default()
        .with_rounds(rounds)
        .with_trainer_count(trainers)
        .with_round_deadline(Duration::from_secs(2))
        .with_scoring_deadline(Duration::from_secs(10))
        .with_scoring_poll(Duration::from_millis(10))
}

fn initial() -> Vec<u8> {
    LogisticModel::random(FEATURES, 3).save_bytes()
}

#[tokio::test(flavor = "multi_thread")]
async fn rounds_run_to_finalization() {
    let net = Network::new();
    let mut coordinator = net.coordinator(config(2, 3).with_total_reward(900));
    for idx in 1..=3 {
        coordinator.register(net.honest(idx));
    }

    coordinator.bootstrap(&initial()).await.unwrap();
    let scorer = net.spawn_scorer();
    let outcomes = coordinator.run().await.unwrap();

    assert_eq!(outcomes.len(), 2);
    for (outcome, round) in outcomes.iter().zip(1..) {
        assert_eq!(outcome.round, round);
        assert_eq!(outcome.selected.len(), 3);
        assert_eq!(outcome.aggregated.len(), 3);
        assert_eq!(outcome.state, RoundState::Finalized);
        assert!(outcome.rewarded);

        let owner = net.owner();
        assert_eq!(owner.round_state(round).await.unwrap(), RoundState::Finalized);
        assert_eq!(
            owner.global_model_ref(round).await.unwrap(),
            Some(outcome.global.clone())
        );
    }

    assert_eq!(net.owner().current_round().await.unwrap(), 3);

    let mut paid = 0;
    for idx in 1..=3 {
        paid += net.owner().balance_of(&net.account(idx)).await.unwrap();
    }
    assert!(paid > 0 && paid <= 1800);

    tokio::time::timeout(Duration::from_secs(5), scorer)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn late_trainer_is_left_out() {
    let net = Network::new();
    let mut coordinator = net.coordinator(config(1, 3).with_round_deadline(Duration::from_millis(800)));
    coordinator.register(net.honest(1));
    coordinator.register(net.honest(2));
    coordinator.register(net.honest(3).late(Duration::from_secs(30)));

    coordinator.bootstrap(&initial()).await.unwrap();
    let scorer = net.spawn_scorer();
    let outcome = coordinator.run_round(1).await.unwrap();

    assert_eq!(outcome.selected.len(), 3);
    assert_eq!(outcome.aggregated.len(), 2);
    assert!(!outcome.aggregated.contains(&net.account(3)));
    assert_eq!(outcome.state, RoundState::Finalized);
    assert_eq!(net.owner().update_of(1, &net.account(3)).await.unwrap(), None);
    assert!(!coordinator.pool().contains(&net.account(3)));

    scorer.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn unreadable_update_is_skipped() {
    let net = Network::new();
    let mut coordinator = net.coordinator(config(1, 3));
    coordinator.register(net.honest(1));
    coordinator.register(net.honest(2));
    coordinator.register(net.bogus(3));

    coordinator.bootstrap(&initial()).await.unwrap();
    let scorer = net.spawn_scorer();
    let outcome = coordinator.run_round(1).await.unwrap();

    let mut aggregated = outcome.aggregated.clone();
    aggregated.sort();
    assert_eq!(aggregated, vec![net.account(1), net.account(2)]);
    assert_eq!(outcome.state, RoundState::Finalized);

    scorer.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn round_without_valid_updates_does_not_advance() {
    let net = Network::new();
    let mut coordinator = net.coordinator(config(1, 2));
    coordinator.register(net.bogus(1));
    coordinator.register(net.bogus(2));

    coordinator.bootstrap(&initial()).await.unwrap();
    let err = coordinator.run_round(1).await.unwrap_err();

    assert!(matches!(
        err,
        CoordinatorErr::NoValidSubmissions {
            round: 1,
            responses: 2
        }
    ));

    let owner = net.owner();
    assert_eq!(owner.current_round().await.unwrap(), 1);
    assert_eq!(owner.global_model_ref(1).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_scorer_leaves_round_aggregated() {
    let net = Network::new();
    let mut coordinator = net.coordinator(
        config(1, 1)
            .with_total_reward(100)
            .with_scoring_deadline(Duration::from_millis(100)),
    );
    coordinator.register(net.honest(1));

    coordinator.bootstrap(&initial()).await.unwrap();
    let outcome = coordinator.run_round(1).await.unwrap();

    assert_eq!(outcome.state, RoundState::Aggregated);
    assert!(!outcome.rewarded);
    assert_eq!(net.owner().round_state(1).await.unwrap(), RoundState::Aggregated);
    assert_eq!(net.owner().current_round().await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn too_few_trainers_for_a_round() {
    let net = Network::new();
    let mut coordinator = net.coordinator(config(1, 3));
    coordinator.register(net.honest(1));

    coordinator.bootstrap(&initial()).await.unwrap();
    let err = coordinator.run_round(1).await.unwrap_err();

    assert!(matches!(
        err,
        CoordinatorErr::InsufficientTrainers {
            needed: 3,
            available: 1
        }
    ));
    assert!(net.owner().selected_trainers(1).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn first_round_trains_from_genesis() {
    let net = Network::new();
    let initial = initial();
    let mut coordinator = net.coordinator(config(1, 1));

    let genesis = coordinator.bootstrap(&initial).await.unwrap();

    assert_eq!(genesis.as_str(), content_ref(&initial));
    let owner = net.owner();
    assert_eq!(owner.global_model_ref(0).await.unwrap(), Some(genesis.clone()));
    assert_eq!(owner.task().await.unwrap().genesis, genesis.as_str());
    assert_eq!(owner.current_round().await.unwrap(), 1);

    let mut trainer = net.honest(1);
    owner.select_trainers(1, &[net.account(1)]).await.unwrap();
    let res = trainer.fit(FitIns { round: 1 }).await.unwrap();
    let update = res.reference.unwrap();

    // A local update from the genesis parameters, reproduced outside the round.
    let mut expected = LogisticModel::new(FEATURES)
        .with_train_data(Dataset::synthetic(FEATURES, 96, 2));
    expected.load_bytes(&initial).unwrap();
    expected.local_update().unwrap();
    assert_eq!(update, content_ref(&expected.save_bytes()));
}

#[tokio::test(flavor = "multi_thread")]
async fn bootstrap_after_restart_keeps_genesis() {
    let net = Network::new();
    let first = net
        .coordinator(config(2, 1))
        .bootstrap(&initial())
        .await
        .unwrap();

    let other = LogisticModel::random(FEATURES, 99).save_bytes();
    let second = net
        .coordinator(config(2, 1))
        .bootstrap(&other)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(net.owner().current_round().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn bootstrap_rejects_undecodable_model() {
    let net = Network::new();
    let err = net
        .coordinator(config(1, 1))
        .bootstrap(b"garbage")
        .await
        .unwrap_err();

    assert!(matches!(err, CoordinatorErr::Model(_)));
    assert!(!net.owner().task().await.unwrap().initialized);
}
