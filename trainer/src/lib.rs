mod agent;
mod config;
mod error;
mod service;

pub use agent::{Contribution, TrainerAgent};
pub use config::TrainerArgs;
pub use error::{Result, TrainerErr};
pub use service::TrainerService;
