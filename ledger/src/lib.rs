//! The round ledger: the single source of truth for the training rounds.
//!
//! `RoundLedger` is the client every process uses. It talks to the contract through a
//! `LedgerTransport`, either in-process (`MemoryTransport`) or over the network
//! (`TcpTransport`) against a `LedgerService` hosting a `Chain`.

pub mod artifact;
mod chain;
mod client;
mod contract;
mod error;
mod memory;
mod service;
mod tcp;
mod transport;

pub use artifact::{ArtifactErr, ContractArtifact};
pub use chain::{Chain, derive_address};
pub use client::{ConfirmationPolicy, RoundLedger};
pub use contract::RoundContract;
pub use error::{LedgerErr, Result};
pub use memory::MemoryTransport;
pub use service::LedgerService;
pub use tcp::TcpTransport;
pub use transport::LedgerTransport;
