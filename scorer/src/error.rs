use std::{error::Error, fmt, io};

use blobstore::BlobErr;
use comms::specs::ledger::RoundState;
use ledger::LedgerErr;
use model::ModelErr;

/// The scorer module's result type.
pub type Result<T> = std::result::Result<T, ScorerErr>;

/// Scoring agent failures.
#[derive(Debug)]
pub enum ScorerErr {
    RoundNotAggregated { round: u64, state: RoundState },
    MissingGlobalModel { round: u64 },
    Ledger(LedgerErr),
    Blob(BlobErr),
    Model(ModelErr),
}

impl ScorerErr {
    /// Whether another pass could succeed, an update that doesn't decode never will.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScorerErr::Ledger(_) | ScorerErr::Blob(_))
    }
}

impl fmt::Display for ScorerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScorerErr::RoundNotAggregated { round, state } => {
                write!(f, "round {round} is {state}, only aggregated rounds are scored")
            }
            ScorerErr::MissingGlobalModel { round } => {
                write!(f, "no global model published for round {round}")
            }
            ScorerErr::Ledger(e) => write!(f, "ledger error: {e}"),
            ScorerErr::Blob(e) => write!(f, "blob error: {e}"),
            ScorerErr::Model(e) => write!(f, "model error: {e}"),
        }
    }
}

impl Error for ScorerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ScorerErr::Ledger(e) => Some(e),
            ScorerErr::Blob(e) => Some(e),
            ScorerErr::Model(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LedgerErr> for ScorerErr {
    fn from(value: LedgerErr) -> Self {
        Self::Ledger(value)
    }
}

impl From<BlobErr> for ScorerErr {
    fn from(value: BlobErr) -> Self {
        Self::Blob(value)
    }
}

impl From<ModelErr> for ScorerErr {
    fn from(value: ModelErr) -> Self {
        Self::Model(value)
    }
}

impl From<ScorerErr> for io::Error {
    fn from(value: ScorerErr) -> Self {
        match value {
            ScorerErr::Ledger(e) => e.into(),
            ScorerErr::Blob(e) => e.into(),
            e => io::Error::other(e),
        }
    }
}
