use std::io;

use comms::{
    WireReceiver, WireSender,
    msg::{Command, Msg},
    specs::{
        Identity,
        fit::{FitIns, FitRes},
    },
};
use log::debug;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpStream, ToSocketAddrs,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};

/// A trainer the coordinator can hand fit instructions to.
#[allow(unused)]
#[trait_variant::make(Participant: Send)]
pub trait LocalParticipant {
    /// The ledger account the trainer submits with.
    fn identity(&self) -> &Identity;

    /// Asks the trainer to train `ins.round` and waits for its answer.
    async fn fit(&mut self, ins: FitIns) -> io::Result<FitRes>;
}

/// A trainer reached over the framed protocol.
pub struct RemoteParticipant<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    identity: Identity,
    rx: WireReceiver<R>,
    tx: WireSender<W>,
    buf: Vec<u8>,
    /// Set while a fit is waiting for its reply, a dropped fit leaves the stream
    /// mid frame.
    interrupted: bool,
}

impl RemoteParticipant<OwnedReadHalf, OwnedWriteHalf> {
    /// Connects to a trainer listening at `addr`.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);
        Self::handshake(rx, tx).await
    }
}

impl<R, W> RemoteParticipant<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Waits for the trainer's hello on an already open channel.
    ///
    /// # Arguments
    /// * `rx` - Receiving end of the trainer channel.
    /// * `tx` - Sending end of the trainer channel.
    ///
    /// # Returns
    /// The participant, identified by the account it announced.
    pub async fn handshake(mut rx: WireReceiver<R>, tx: WireSender<W>) -> io::Result<Self> {
        let mut buf = Vec::new();

        let identity = match rx.recv_into(&mut buf).await? {
            Msg::Control(Command::Hello { identity }) => identity,
            msg => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("expected a hello, got {msg:?}"),
                ));
            }
        };

        debug!(trainer = identity.as_str(); "trainer registered");

        Ok(Self {
            identity,
            rx,
            tx,
            buf,
            interrupted: false,
        })
    }

    /// Tells the trainer there's nothing else to do.
    pub async fn disconnect(&mut self) -> io::Result<()> {
        self.tx.send(&Msg::Control(Command::Disconnect)).await
    }
}

impl<R, W> Participant for RemoteParticipant<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn fit(&mut self, ins: FitIns) -> io::Result<FitRes> {
        if self.interrupted {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "an interrupted fit left the trainer channel out of sync",
            ));
        }

        self.interrupted = true;
        self.tx.send(&Msg::Control(Command::Fit(ins))).await?;

        let res = loop {
            match self.rx.recv_into(&mut self.buf).await? {
                Msg::Control(Command::FitRes(res)) if res.round == ins.round => break Ok(res),
                Msg::Control(Command::FitRes(res)) if res.round < ins.round => {
                    debug!(
                        round = ins.round,
                        stale = res.round,
                        trainer = self.identity.as_str();
                        "discarding a stale fit result"
                    );
                }
                Msg::Err(detail) => break Err(io::Error::other(detail.into_owned())),
                msg => {
                    break Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("expected a fit result for round {}, got {msg:?}", ins.round),
                    ));
                }
            }
        };

        self.interrupted = false;
        res
    }
}

#[cfg(test)]
mod tests {
    use tokio::io;

    use super::{Command, FitIns, FitRes, Identity, Msg, Participant, RemoteParticipant};

    #[tokio::test]
    async fn stale_results_are_skipped() {
        let (one, two) = io::duplex(4096);
        let (rx, tx) = io::split(two);
        let (mut trainer_rx, mut trainer_tx) = comms::channel(rx, tx);

        let identity = Identity::new("0xtrainer");
        let hello = Command::Hello {
            identity: identity.clone(),
        };
        trainer_tx.send(&Msg::Control(hello)).await.unwrap();

        let (rx, tx) = io::split(one);
        let (rx, tx) = comms::channel(rx, tx);
        let mut participant = RemoteParticipant::handshake(rx, tx).await.unwrap();
        assert_eq!(participant.identity(), &identity);

        let stale = Command::FitRes(FitRes::submitted(1, "sha256:old"));
        let fresh = Command::FitRes(FitRes::submitted(2, "sha256:new"));
        trainer_tx.send(&Msg::Control(stale)).await.unwrap();
        trainer_tx.send(&Msg::Control(fresh)).await.unwrap();

        let res = participant.fit(FitIns { round: 2 }).await.unwrap();
        assert_eq!(res.reference.as_deref(), Some("sha256:new"));

        let mut buf = Vec::new();
        match trainer_rx.recv_into(&mut buf).await.unwrap() {
            Msg::Control(Command::Fit(ins)) => assert_eq!(ins.round, 2),
            msg => panic!("unexpected {msg:?}"),
        }
    }

    #[tokio::test]
    async fn interrupted_fit_is_not_reused() {
        let (one, two) = io::duplex(4096);
        let (rx, tx) = io::split(two);
        let (_trainer_rx, mut trainer_tx) = comms::channel(rx, tx);

        let hello = Command::Hello {
            identity: Identity::new("0xtrainer"),
        };
        trainer_tx.send(&Msg::Control(hello)).await.unwrap();

        let (rx, tx) = io::split(one);
        let (rx, tx) = comms::channel(rx, tx);
        let mut participant = RemoteParticipant::handshake(rx, tx).await.unwrap();

        let cut = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            participant.fit(FitIns { round: 1 }),
        )
        .await;
        assert!(cut.is_err());

        let reply = Command::FitRes(FitRes::submitted(1, "sha256:late"));
        trainer_tx.send(&Msg::Control(reply)).await.unwrap();

        let err = participant.fit(FitIns { round: 2 }).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
