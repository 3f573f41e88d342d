use std::io;

use comms::{
    WireReceiver, WireSender,
    msg::{Command, Msg},
};
use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};

use crate::MemoryBlobs;

/// Hosts a `MemoryBlobs` store for remote `TcpBlobs` clients.
#[derive(Clone, Default)]
pub struct BlobService {
    store: MemoryBlobs,
}

impl BlobService {
    pub fn new(store: MemoryBlobs) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryBlobs {
        &self.store
    }

    /// Accepts clients forever, each one is served on its own task.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        info!("blob store listening at {}", listener.local_addr()?);

        loop {
            let (stream, addr) = listener.accept().await?;
            let (rx, tx) = stream.into_split();
            let (rx, tx) = comms::channel(rx, tx);
            let service = self.clone();

            tokio::spawn(async move {
                if let Err(e) = service.handle(rx, tx).await {
                    warn!("blob client {addr} dropped: {e}");
                }
            });
        }
    }

    /// Serves uploads and downloads of a single client until it disconnects.
    pub async fn handle<R, W>(&self, mut rx: WireReceiver<R>, mut tx: WireSender<W>) -> io::Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut buf = Vec::new();

        loop {
            let msg = match rx.recv_into(&mut buf).await {
                Ok(msg) => msg,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e),
            };

            match msg {
                Msg::Blob(bytes) => {
                    let reference = self.store.insert(bytes);
                    debug!(reference = reference.as_str(), size = bytes.len(); "blob stored");
                    tx.send(&Msg::Control(Command::Stored { reference })).await?;
                }
                Msg::Control(Command::Get { reference }) => match self.store.lookup(&reference) {
                    Some(blob) => tx.send(&Msg::Blob(&blob[..])).await?,
                    None => {
                        debug!(reference = reference.as_str(); "blob not found");
                        tx.send(&Msg::Control(Command::Missing { reference })).await?;
                    }
                },
                Msg::Control(Command::Disconnect) => return Ok(()),
                other => {
                    let text = format!("blob store can't handle {other:?}");
                    tx.send(&Msg::Err(text.into())).await?;
                }
            }
        }
    }
}
