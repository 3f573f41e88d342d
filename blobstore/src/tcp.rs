use std::net::SocketAddr;

use comms::{
    msg::{Command, Msg},
    specs::ContentRef,
};
use tokio::net::TcpStream;

use crate::{BlobErr, BlobTransport, Result};

/// A transport reaching a `BlobService` with a fresh connection per operation.
#[derive(Debug, Clone)]
pub struct TcpBlobs {
    addr: SocketAddr,
}

impl TcpBlobs {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl BlobTransport for TcpBlobs {
    async fn add(&self, bytes: &[u8]) -> Result<String> {
        let stream = TcpStream::connect(self.addr).await?;
        let (rx, tx) = stream.into_split();
        let (mut rx, mut tx) = comms::channel(rx, tx);

        tx.send(&Msg::Blob(bytes)).await?;

        let mut buf = Vec::new();
        let reference = match rx.recv_into(&mut buf).await? {
            Msg::Control(Command::Stored { reference }) => reference,
            Msg::Err(detail) => return Err(BlobErr::Protocol(detail.into_owned())),
            msg => return Err(unexpected(&msg)),
        };

        tx.send(&Msg::Control(Command::Disconnect)).await?;
        Ok(reference)
    }

    async fn cat(&self, reference: &ContentRef) -> Result<Vec<u8>> {
        let stream = TcpStream::connect(self.addr).await?;
        let (rx, tx) = stream.into_split();
        let (mut rx, mut tx) = comms::channel(rx, tx);

        let get = Command::Get {
            reference: reference.clone(),
        };
        tx.send(&Msg::Control(get)).await?;

        let mut buf = Vec::new();
        let bytes = match rx.recv_into(&mut buf).await? {
            Msg::Blob(bytes) => bytes.to_vec(),
            Msg::Control(Command::Missing { reference }) => {
                return Err(BlobErr::NotFound(reference));
            }
            Msg::Err(detail) => return Err(BlobErr::Protocol(detail.into_owned())),
            msg => return Err(unexpected(&msg)),
        };

        tx.send(&Msg::Control(Command::Disconnect)).await?;
        Ok(bytes)
    }
}

fn unexpected(msg: &Msg<'_>) -> BlobErr {
    BlobErr::Protocol(format!("unexpected {msg:?} from the blob store"))
}
