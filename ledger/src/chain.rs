use std::collections::{HashMap, VecDeque};

use comms::specs::{
    Identity,
    ledger::{Answer, Call, Query, Receipt, TxId, TxOutcome, TxReceipt},
};
use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::RoundContract;

const CONTRACT_SEED: &str = "round-contract";

/// Derives a deterministic 20 byte account address from `seed`.
pub fn derive_address(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    format!("0x{}", hex::encode(&digest[..20]))
}

struct PendingTx {
    id: TxId,
    from: Identity,
    call: Call,
}

/// A single node ledger hosting one `RoundContract`.
///
/// Transactions are queued and applied in submission order when a block is mined.
/// With auto mining on every submission is mined into its own block right away.
pub struct Chain {
    address: String,
    accounts: Vec<Identity>,
    contract: RoundContract,
    pending: VecDeque<PendingTx>,
    receipts: HashMap<TxId, TxReceipt>,
    height: u64,
    next_tx: u64,
    auto_mine: bool,
}

impl Chain {
    /// Creates a new `Chain` with the contract already deployed.
    ///
    /// # Arguments
    /// * `accounts` - The amount of unlocked accounts, the first one owns the contract.
    ///
    /// # Returns
    /// A new `Chain` instance.
    pub fn new(accounts: usize) -> Self {
        let accounts: Vec<_> = (0..accounts.max(1))
            .map(|i| Identity::new(derive_address(&format!("account-{i}"))))
            .collect();

        let contract = RoundContract::new(accounts[0].clone());

        Self {
            address: derive_address(CONTRACT_SEED),
            accounts,
            contract,
            pending: VecDeque::new(),
            receipts: HashMap::new(),
            height: 0,
            next_tx: 0,
            auto_mine: true,
        }
    }

    /// The address the contract is deployed at.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn accounts(&self) -> &[Identity] {
        &self.accounts
    }

    pub fn contract(&self) -> &RoundContract {
        &self.contract
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn set_auto_mine(&mut self, auto_mine: bool) {
        self.auto_mine = auto_mine;
    }

    /// Answers a read-only call against the current state.
    pub fn query(&self, query: &Query) -> Answer {
        let contract = &self.contract;

        match query {
            Query::Code { address } => Answer::Deployed(*address == self.address),
            Query::Task => Answer::Task(contract.task().clone()),
            Query::CurrentRound => Answer::Round(contract.current_round()),
            Query::GlobalModel { round } => {
                Answer::Reference(contract.global_model(*round).to_string())
            }
            Query::SelectedTrainers { round } => {
                Answer::Trainers(contract.selected_trainers(*round).to_vec())
            }
            Query::Update { round, trainer } => {
                Answer::Reference(contract.update(*round, trainer).to_string())
            }
            Query::Score { round, trainer } => Answer::Score(contract.score(*round, trainer)),
            Query::RoundState { round } => Answer::State(contract.round_state(*round)),
            Query::Balance { account } => Answer::Balance(contract.balance(account)),
            Query::Accounts => Answer::Accounts(self.accounts.clone()),
        }
    }

    /// Queues a transaction, mining it right away if auto mining is on.
    ///
    /// # Returns
    /// The id of the new transaction.
    pub fn submit(&mut self, from: Identity, call: Call) -> TxId {
        let id = TxId(self.next_tx);
        self.next_tx += 1;

        debug!(tx = id.0, call = call.name(); "transaction queued");
        self.pending.push_back(PendingTx { id, from, call });

        if self.auto_mine {
            self.mine();
        }

        id
    }

    /// Mines every pending transaction into a new block.
    ///
    /// # Returns
    /// The amount of transactions included, no block is produced if there are none.
    pub fn mine(&mut self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        self.height += 1;
        let block = self.height;
        let mut count = 0;

        while let Some(PendingTx { id, from, call }) = self.pending.pop_front() {
            let name = call.name();

            let outcome = match self.contract.execute(&from, call) {
                Ok(()) => TxOutcome::Confirmed,
                Err(revert) => {
                    warn!(tx = id.0, block = block, call = name; "transaction reverted: {revert:?}");
                    TxOutcome::Reverted(revert)
                }
            };

            let receipt = Receipt { tx: id, block };
            self.receipts.insert(id, TxReceipt { receipt, outcome });
            count += 1;
        }

        debug!(block = block, txs = count; "block mined");
        count
    }

    /// The receipt of `tx`, `None` while it's pending or if it's unknown.
    pub fn receipt(&self, tx: TxId) -> Option<TxReceipt> {
        self.receipts.get(&tx).cloned()
    }
}
