use serde::{Deserialize, Serialize};

/// The instruction a coordinator sends to each selected trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitIns {
    pub round: u64,
}

/// A trainer's answer to a `FitIns`.
///
/// `reference` is kept as the raw string the trainer claims, the coordinator is the
/// one that decides whether it's usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitRes {
    pub round: u64,
    pub reference: Option<String>,
    pub error: Option<String>,
}

impl FitRes {
    /// A response carrying the reference of the trainer's updated model.
    pub fn submitted(round: u64, reference: impl Into<String>) -> Self {
        Self {
            round,
            reference: Some(reference.into()),
            error: None,
        }
    }

    /// A response for a trainer that won't contribute to `round`.
    pub fn absent(round: u64, error: impl Into<String>) -> Self {
        Self {
            round,
            reference: None,
            error: Some(error.into()),
        }
    }
}
