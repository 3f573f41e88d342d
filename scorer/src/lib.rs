mod agent;
mod config;
mod error;

pub use agent::{SCORING_ATTEMPTS, ScoreReport, ScoringAgent, score_from_accuracy};
pub use config::ScorerArgs;
pub use error::{Result, ScorerErr};
