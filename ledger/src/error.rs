use std::{error::Error, fmt, io, time::Duration};

use comms::specs::{
    Identity,
    ledger::{Revert, TxId},
};

/// The ledger module's result type.
pub type Result<T> = std::result::Result<T, LedgerErr>;

/// Failures of the round ledger client.
#[derive(Debug)]
pub enum LedgerErr {
    /// The ledger endpoint couldn't be reached.
    Unavailable(io::Error),
    StateConflict {
        call: &'static str,
        detail: String,
    },
    /// The transaction was sent but no block included it in time.
    ConfirmationTimeout {
        call: &'static str,
        tx: TxId,
        after: Duration,
    },
    InvalidScore {
        score: u32,
    },
    Unauthorized {
        call: &'static str,
        account: Identity,
    },
    NotInitialized,
    ContractNotFound {
        address: String,
    },
    UnknownAccount {
        index: usize,
        available: usize,
    },
    /// The ledger answered with something that doesn't match the request.
    Protocol(String),
}

impl LedgerErr {
    /// Maps the contract's revert reason of `call` into a client error.
    pub(crate) fn from_revert(call: &'static str, revert: Revert) -> Self {
        match revert {
            Revert::StateConflict(detail) => LedgerErr::StateConflict { call, detail },
            Revert::InvalidScore(score) => LedgerErr::InvalidScore { score },
            Revert::Unauthorized(account) => LedgerErr::Unauthorized { call, account },
            Revert::NotInitialized => LedgerErr::NotInitialized,
        }
    }
}

impl fmt::Display for LedgerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerErr::Unavailable(e) => write!(f, "ledger unavailable: {e}"),
            LedgerErr::StateConflict { call, detail } => {
                write!(f, "state conflict on {call}: {detail}")
            }
            LedgerErr::ConfirmationTimeout { call, tx, after } => write!(
                f,
                "{call} transaction {tx} not confirmed after {}ms",
                after.as_millis()
            ),
            LedgerErr::InvalidScore { score } => {
                write!(f, "invalid score {score}, must be within [0, 100]")
            }
            LedgerErr::Unauthorized { call, account } => {
                write!(f, "account {account} is not allowed to {call}")
            }
            LedgerErr::NotInitialized => write!(f, "the task is not initialized"),
            LedgerErr::ContractNotFound { address } => {
                write!(f, "no contract code at address {address}")
            }
            LedgerErr::UnknownAccount { index, available } => write!(
                f,
                "account index {index} out of range, the node has {available} accounts"
            ),
            LedgerErr::Protocol(detail) => write!(f, "ledger protocol error: {detail}"),
        }
    }
}

impl Error for LedgerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LedgerErr::Unavailable(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LedgerErr {
    fn from(value: io::Error) -> Self {
        Self::Unavailable(value)
    }
}

impl From<LedgerErr> for io::Error {
    fn from(value: LedgerErr) -> Self {
        match value {
            LedgerErr::Unavailable(e) => e,
            e @ LedgerErr::ConfirmationTimeout { .. } => io::Error::new(io::ErrorKind::TimedOut, e),
            e => io::Error::other(e),
        }
    }
}
