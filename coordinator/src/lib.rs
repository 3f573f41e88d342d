pub mod aggregate;
mod config;
mod coordinator;
mod error;
mod machine;
mod participant;
mod sampler;

pub use config::{CoordinatorArgs, CoordinatorConfig};
pub use coordinator::{Coordinator, RoundOutcome};
pub use error::{CoordinatorErr, Result};
pub use machine::RoundMachine;
pub use participant::{LocalParticipant, Participant, RemoteParticipant};
pub use sampler::TrainerSampler;
