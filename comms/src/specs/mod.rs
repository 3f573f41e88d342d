//! Wire level types shared by every process of the system.

pub mod fit;
mod identity;
pub mod ledger;
mod reference;

pub use identity::Identity;
pub use reference::{ContentRef, InvalidRef};
