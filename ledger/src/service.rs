use std::{io, time::Duration};

use comms::{
    WireReceiver, WireSender,
    msg::{Command, Msg},
};
use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};

use crate::{Chain, MemoryTransport};

/// Hosts a `Chain` for remote `TcpTransport` clients.
#[derive(Clone)]
pub struct LedgerService {
    ledger: MemoryTransport,
}

impl LedgerService {
    /// Creates a new `LedgerService`.
    ///
    /// # Arguments
    /// * `chain` - The chain to host.
    ///
    /// # Returns
    /// A new `LedgerService` instance.
    pub fn new(chain: Chain) -> Self {
        Self {
            ledger: MemoryTransport::from_chain(chain),
        }
    }

    /// An in-process handle to the hosted chain.
    pub fn local(&self) -> MemoryTransport {
        self.ledger.clone()
    }

    /// Accepts clients forever, each one is served on its own task.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        info!("ledger listening at {}", listener.local_addr()?);

        loop {
            let (stream, addr) = listener.accept().await?;
            let (rx, tx) = stream.into_split();
            let (rx, tx) = comms::channel(rx, tx);
            let service = self.clone();

            tokio::spawn(async move {
                debug!("ledger client connected from {addr}");

                if let Err(e) = service.handle(rx, tx).await {
                    warn!("ledger client {addr} dropped: {e}");
                }
            });
        }
    }

    /// Mines the pending transactions every `interval`.
    ///
    /// Meant for chains with auto mining off, never returns.
    pub async fn produce_blocks(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            self.ledger.mine();
        }
    }

    /// Serves the requests of a single client until it disconnects.
    pub async fn handle<R, W>(&self, mut rx: WireReceiver<R>, mut tx: WireSender<W>) -> io::Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut buf = Vec::new();

        loop {
            let reply = match rx.recv_into(&mut buf).await {
                Ok(Msg::Control(cmd)) => match self.reply(cmd) {
                    Some(reply) => reply,
                    None => return Ok(()),
                },
                Ok(msg) => {
                    let text = format!("ledger can't handle {} messages", msg.kind());
                    tx.send(&Msg::Err(text.into())).await?;
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e),
            };

            tx.send(&reply).await?;
        }
    }

    fn reply(&self, cmd: Command) -> Option<Msg<'static>> {
        let mut chain = self.ledger.chain();

        let reply = match cmd {
            Command::Query(query) => Command::Answer(chain.query(&query)),
            Command::Submit { from, call } => Command::Pending {
                tx: chain.submit(from, call),
            },
            Command::Receipt { tx } => Command::ReceiptReply(chain.receipt(tx)),
            Command::Disconnect => return None,
            other => {
                let text = format!("ledger can't handle {other:?}");
                return Some(Msg::Err(text.into()));
            }
        };

        Some(Msg::Control(reply))
    }
}
