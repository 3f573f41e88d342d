use comms::specs::{
    Identity,
    ledger::{Answer, Call, Query, TxId, TxReceipt},
};

use crate::Result;

/// The raw access to a ledger hosting the round contract.
#[allow(unused)]
#[trait_variant::make(LedgerTransport: Send)]
pub trait LocalLedgerTransport: Sync {
    /// Runs a read-only call against the latest block.
    async fn query(&self, query: Query) -> Result<Answer>;

    /// Signs `call` with the `from` account and sends it, without waiting for it to be mined.
    async fn submit(&self, from: &Identity, call: Call) -> Result<TxId>;

    /// Fetches the receipt of `tx`, `None` if it's still pending.
    async fn receipt(&self, tx: TxId) -> Result<Option<TxReceipt>>;
}
