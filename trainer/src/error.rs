use std::{error::Error, fmt, io};

use blobstore::BlobErr;
use ledger::LedgerErr;
use model::ModelErr;

/// The trainer module's result type.
pub type Result<T> = std::result::Result<T, TrainerErr>;

/// Trainer agent failures.
#[derive(Debug)]
pub enum TrainerErr {
    /// The base global model of the round isn't published.
    MissingGlobalModel {
        round: u64,
    },
    RoundMismatch {
        instructed: u64,
        current: u64,
    },
    NotSelected {
        round: u64,
    },
    UnexpectedMessage {
        got: String,
    },
    Ledger(LedgerErr),
    Blob(BlobErr),
    Model(ModelErr),
    Io(io::Error),
}

impl fmt::Display for TrainerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainerErr::MissingGlobalModel { round } => {
                write!(f, "no global model published for round {round}")
            }
            TrainerErr::RoundMismatch {
                instructed,
                current,
            } => write!(
                f,
                "instructed to train round {instructed} but the ledger is at round {current}"
            ),
            TrainerErr::NotSelected { round } => {
                write!(f, "not selected to train round {round}")
            }
            TrainerErr::UnexpectedMessage { got } => write!(f, "unexpected message: got {got}"),
            TrainerErr::Ledger(e) => write!(f, "ledger error: {e}"),
            TrainerErr::Blob(e) => write!(f, "blob error: {e}"),
            TrainerErr::Model(e) => write!(f, "model error: {e}"),
            TrainerErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for TrainerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainerErr::Ledger(e) => Some(e),
            TrainerErr::Blob(e) => Some(e),
            TrainerErr::Model(e) => Some(e),
            TrainerErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LedgerErr> for TrainerErr {
    fn from(value: LedgerErr) -> Self {
        Self::Ledger(value)
    }
}

impl From<BlobErr> for TrainerErr {
    fn from(value: BlobErr) -> Self {
        Self::Blob(value)
    }
}

impl From<ModelErr> for TrainerErr {
    fn from(value: ModelErr) -> Self {
        Self::Model(value)
    }
}

impl From<io::Error> for TrainerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<TrainerErr> for io::Error {
    fn from(value: TrainerErr) -> Self {
        match value {
            TrainerErr::Io(e) => e,
            TrainerErr::UnexpectedMessage { .. } => io::Error::new(io::ErrorKind::InvalidData, value),
            e => io::Error::other(e),
        }
    }
}
