use std::{io, net::SocketAddr};

use comms::{
    WireReceiver, WireSender,
    msg::{Command, Msg},
    specs::{
        Identity,
        ledger::{Answer, Call, Query, TxId, TxReceipt},
    },
};
use log::{debug, info, warn};
use tokio::{
    net::{
        TcpStream, ToSocketAddrs,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
};

use crate::{LedgerErr, LedgerTransport, Result};

struct Conn {
    rx: WireReceiver<OwnedReadHalf>,
    tx: WireSender<OwnedWriteHalf>,
    buf: Vec<u8>,
    /// Set while a request is in flight, a cancelled request leaves it set and the
    /// connection out of sync.
    poisoned: bool,
}

impl Conn {
    async fn open(peer: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(peer).await?;
        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);

        Ok(Self {
            rx,
            tx,
            buf: Vec::new(),
            poisoned: false,
        })
    }
}

/// A transport talking to a `LedgerService` over a single TCP connection.
///
/// Requests are serialized, each one waits for its reply before the next is sent.
/// A connection left out of sync by a cancelled request is replaced on the next one.
pub struct TcpTransport {
    peer: SocketAddr,
    conn: Mutex<Conn>,
}

impl TcpTransport {
    /// Connects to a ledger node and checks the contract is deployed.
    ///
    /// # Arguments
    /// * `addr` - The network address of the ledger node.
    /// * `contract` - The address the round contract should be deployed at.
    ///
    /// # Returns
    /// A new `TcpTransport`, or `ContractNotFound` if there's no code at `contract`.
    pub async fn connect<A: ToSocketAddrs>(addr: A, contract: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);

        let transport = Self {
            peer,
            conn: Mutex::new(Conn {
                rx,
                tx,
                buf: Vec::new(),
                poisoned: false,
            }),
        };

        let query = Query::Code {
            address: contract.to_string(),
        };

        match transport.query(query).await? {
            Answer::Deployed(true) => {
                info!(contract = contract; "connected to ledger at {peer}");
                Ok(transport)
            }
            Answer::Deployed(false) => Err(LedgerErr::ContractNotFound {
                address: contract.to_string(),
            }),
            other => Err(LedgerErr::Protocol(format!(
                "unexpected answer {other:?} to a code query"
            ))),
        }
    }

    async fn request(&self, cmd: Command) -> Result<Command> {
        let mut guard = self.conn.lock().await;
        let conn = &mut *guard;

        if conn.poisoned {
            warn!("ledger connection left out of sync, reconnecting to {}", self.peer);
            *conn = Conn::open(self.peer).await?;
        }

        conn.poisoned = true;
        conn.tx.send(&Msg::Control(cmd)).await?;

        let reply = match conn.rx.recv_into(&mut conn.buf).await? {
            Msg::Control(reply) => reply,
            Msg::Err(detail) => return Err(LedgerErr::Protocol(detail.into_owned())),
            msg => {
                return Err(LedgerErr::Protocol(format!(
                    "unexpected {} message from the ledger",
                    msg.kind()
                )));
            }
        };

        conn.poisoned = false;
        Ok(reply)
    }
}

impl LedgerTransport for TcpTransport {
    async fn query(&self, query: Query) -> Result<Answer> {
        match self.request(Command::Query(query)).await? {
            Command::Answer(answer) => Ok(answer),
            other => Err(LedgerErr::Protocol(format!(
                "expected an answer, got {other:?}"
            ))),
        }
    }

    async fn submit(&self, from: &Identity, call: Call) -> Result<TxId> {
        let cmd = Command::Submit {
            from: from.clone(),
            call,
        };

        match self.request(cmd).await? {
            Command::Pending { tx } => {
                debug!(tx = tx.0; "transaction accepted by the node");
                Ok(tx)
            }
            other => Err(LedgerErr::Protocol(format!(
                "expected a pending transaction, got {other:?}"
            ))),
        }
    }

    async fn receipt(&self, tx: TxId) -> Result<Option<TxReceipt>> {
        match self.request(Command::Receipt { tx }).await? {
            Command::ReceiptReply(receipt) => Ok(receipt),
            other => Err(LedgerErr::Protocol(format!(
                "expected a receipt, got {other:?}"
            ))),
        }
    }
}
