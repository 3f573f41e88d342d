use std::{error::Error, fmt, io};

use blobstore::BlobErr;
use comms::specs::ledger::RoundState;
use ledger::LedgerErr;
use model::ModelErr;

/// The coordinator module's result type.
pub type Result<T> = std::result::Result<T, CoordinatorErr>;

/// All errors that can occur while coordinating rounds.
#[derive(Debug)]
pub enum CoordinatorErr {
    /// No selected trainer answered before the round deadline.
    NoResponses {
        round: u64,
    },
    /// Trainers answered but none of their updates could be used.
    NoValidSubmissions {
        round: u64,
        responses: usize,
    },
    /// A model couldn't be uploaded to the blob store.
    PublishFailed(BlobErr),
    InsufficientTrainers {
        needed: usize,
        available: usize,
    },
    IllegalTransition {
        round: u64,
        from: RoundState,
        to: RoundState,
    },
    SizeMismatch {
        got: usize,
        expected: usize,
    },
    Ledger(LedgerErr),
    Blob(BlobErr),
    Model(ModelErr),
    Io(io::Error),
}

impl fmt::Display for CoordinatorErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponses { round } => write!(f, "no trainer answered round {round}"),
            Self::NoValidSubmissions { round, responses } => write!(
                f,
                "none of the {responses} responses of round {round} held a usable update"
            ),
            Self::PublishFailed(e) => write!(f, "failed to publish model: {e}"),
            Self::InsufficientTrainers { needed, available } => write!(
                f,
                "need {needed} trainers but only {available} are registered"
            ),
            Self::IllegalTransition { round, from, to } => {
                write!(f, "round {round} can't go from {from} to {to}")
            }
            Self::SizeMismatch { got, expected } => write!(
                f,
                "update has {got} parameters, expected {expected}"
            ),
            Self::Ledger(e) => write!(f, "ledger error: {e}"),
            Self::Blob(e) => write!(f, "blob error: {e}"),
            Self::Model(e) => write!(f, "model error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for CoordinatorErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PublishFailed(e) | Self::Blob(e) => Some(e),
            Self::Ledger(e) => Some(e),
            Self::Model(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LedgerErr> for CoordinatorErr {
    fn from(e: LedgerErr) -> Self {
        Self::Ledger(e)
    }
}

impl From<BlobErr> for CoordinatorErr {
    fn from(e: BlobErr) -> Self {
        Self::Blob(e)
    }
}

impl From<ModelErr> for CoordinatorErr {
    fn from(e: ModelErr) -> Self {
        Self::Model(e)
    }
}

impl From<io::Error> for CoordinatorErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<CoordinatorErr> for io::Error {
    fn from(e: CoordinatorErr) -> Self {
        match e {
            CoordinatorErr::Io(e) => e,
            e => io::Error::other(e),
        }
    }
}
