use blobstore::BlobTransport;
use comms::{
    WireReceiver, WireSender,
    msg::{Command, Msg},
};
use ledger::LedgerTransport;
use log::{debug, info, warn};
use model::TrainableModel;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{Result, TrainerAgent, TrainerErr};

/// Serves fit instructions from a coordinator to a `TrainerAgent`.
pub struct TrainerService<L, B, M>
where
    L: LedgerTransport,
    B: BlobTransport,
    M: TrainableModel,
{
    agent: TrainerAgent<L, B, M>,
    buf: Vec<u8>,
}

impl<L, B, M> TrainerService<L, B, M>
where
    L: LedgerTransport,
    B: BlobTransport,
    M: TrainableModel,
{
    pub fn new(agent: TrainerAgent<L, B, M>) -> Self {
        Self {
            agent,
            buf: Vec::new(),
        }
    }

    pub fn agent(&self) -> &TrainerAgent<L, B, M> {
        &self.agent
    }

    /// Greets a coordinator with this trainer's identity and answers its fit
    /// instructions until it disconnects.
    ///
    /// # Arguments
    /// * `rx` - Receiving end of the coordinator channel.
    /// * `tx` - Sending end of the coordinator channel.
    ///
    /// # Errors
    /// Returns `TrainerErr` on I/O failures or protocol violations.
    pub async fn serve<R, W>(&mut self, mut rx: WireReceiver<R>, mut tx: WireSender<W>) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let hello = Command::Hello {
            identity: self.agent.identity().clone(),
        };
        tx.send(&Msg::Control(hello)).await?;

        loop {
            let ins = match rx.recv_into(&mut self.buf).await? {
                Msg::Control(Command::Fit(ins)) => ins,
                Msg::Control(Command::Disconnect) => {
                    info!(trainer = self.agent.identity().as_str(); "coordinator disconnected");
                    return Ok(());
                }
                Msg::Err(detail) => {
                    warn!("coordinator reported an error: {detail}");
                    continue;
                }
                msg => {
                    return Err(TrainerErr::UnexpectedMessage {
                        got: format!("{msg:?}"),
                    });
                }
            };

            debug!(round = ins.round; "received fit instruction");
            let contribution = self.agent.fit(ins).await;

            let reply = Command::FitRes(contribution.to_fit_res());
            tx.send(&Msg::Control(reply)).await?;
        }
    }
}
