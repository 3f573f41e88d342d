use blobstore::{BlobClient, MemoryBlobs};
use comms::{
    msg::{Command, Msg},
    specs::fit::FitIns,
};
use ledger::{MemoryTransport, RoundLedger};
use model::{Dataset, LogisticModel, TrainableModel};
use tokio::io;
use trainer::{TrainerAgent, TrainerService};

#[tokio::test(flavor = "multi_thread")]
async fn hello_then_fit_until_disconnect() {
    let ledger = MemoryTransport::new(2);
    let blobs = MemoryBlobs::new();
    let [owner, trainer] = [0, 1].map(|i| ledger.accounts()[i].clone());

    let owner_client = RoundLedger::new(ledger.clone(), owner);
    let genesis = BlobClient::new(blobs.clone())
        .put(&LogisticModel::new(2).save_bytes())
        .await
        .unwrap();
    owner_client.initialize(&genesis, 1, 1).await.unwrap();
    owner_client.submit_global_model(0, &genesis).await.unwrap();
    owner_client
        .select_trainers(1, std::slice::from_ref(&trainer))
        .await
        .unwrap();

    let model = LogisticModel::new(2).with_train_data(Dataset::synthetic(2, 32, 9));
    let agent = TrainerAgent::new(
        RoundLedger::new(ledger.clone(), trainer.clone()),
        BlobClient::new(blobs),
        model,
    );

    let (one, two) = io::duplex(4096);
    let (rx, tx) = io::split(one);
    let (rx, tx) = comms::channel(rx, tx);
    let server = tokio::spawn(async move { TrainerService::new(agent).serve(rx, tx).await });

    let (rx, tx) = io::split(two);
    let (mut rx, mut tx) = comms::channel(rx, tx);
    let mut buf = Vec::new();

    match rx.recv_into(&mut buf).await.unwrap() {
        Msg::Control(Command::Hello { identity }) => assert_eq!(identity, trainer),
        msg => panic!("expected hello, got {msg:?}"),
    }

    tx.send(&Msg::Control(Command::Fit(FitIns { round: 1 })))
        .await
        .unwrap();

    let res = match rx.recv_into(&mut buf).await.unwrap() {
        Msg::Control(Command::FitRes(res)) => res,
        msg => panic!("expected a fit result, got {msg:?}"),
    };
    assert_eq!(res.round, 1);
    assert!(res.error.is_none(), "{:?}", res.error);

    let submitted = owner_client.update_of(1, &trainer).await.unwrap().unwrap();
    assert_eq!(res.reference.as_deref(), Some(submitted.as_str()));

    tx.send(&Msg::Control(Command::Disconnect)).await.unwrap();
    server.await.unwrap().unwrap();
}
