use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use comms::specs::{
    Identity,
    ledger::{Answer, Call, Query, TxId, TxReceipt},
};
use parking_lot::{Mutex, MutexGuard};

use crate::{Chain, LedgerErr, LedgerTransport, Result};

/// An in-process transport sharing one `Chain` between every clone.
#[derive(Clone)]
pub struct MemoryTransport {
    chain: Arc<Mutex<Chain>>,
    online: Arc<AtomicBool>,
}

impl MemoryTransport {
    /// Creates a new `MemoryTransport` over a fresh chain.
    ///
    /// # Arguments
    /// * `accounts` - The amount of accounts the chain unlocks.
    pub fn new(accounts: usize) -> Self {
        Self::from_chain(Chain::new(accounts))
    }

    pub fn from_chain(chain: Chain) -> Self {
        Self {
            chain: Arc::new(Mutex::new(chain)),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Locks the underlying chain.
    pub fn chain(&self) -> MutexGuard<'_, Chain> {
        self.chain.lock()
    }

    /// Turns the connectivity on or off, while off every call fails with `Unavailable`.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn set_auto_mine(&self, auto_mine: bool) {
        self.chain.lock().set_auto_mine(auto_mine);
    }

    /// Mines the pending transactions into a new block.
    pub fn mine(&self) -> usize {
        self.chain.lock().mine()
    }

    pub fn accounts(&self) -> Vec<Identity> {
        self.chain.lock().accounts().to_vec()
    }

    pub fn address(&self) -> String {
        self.chain.lock().address().to_string()
    }

    fn ensure_online(&self) -> Result<()> {
        if !self.online.load(Ordering::Acquire) {
            let e = io::Error::new(io::ErrorKind::ConnectionRefused, "ledger is offline");
            return Err(LedgerErr::Unavailable(e));
        }

        Ok(())
    }
}

impl LedgerTransport for MemoryTransport {
    async fn query(&self, query: Query) -> Result<Answer> {
        self.ensure_online()?;
        Ok(self.chain.lock().query(&query))
    }

    async fn submit(&self, from: &Identity, call: Call) -> Result<TxId> {
        self.ensure_online()?;
        Ok(self.chain.lock().submit(from.clone(), call))
    }

    async fn receipt(&self, tx: TxId) -> Result<Option<TxReceipt>> {
        self.ensure_online()?;
        Ok(self.chain.lock().receipt(tx))
    }
}
