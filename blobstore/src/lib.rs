//! The blob exchange: content-addressed storage for model snapshots.
//!
//! Components only ever use `BlobClient`, which wraps a `BlobTransport` with reference
//! validation and a per operation timeout.

mod client;
mod error;
mod memory;
mod service;
mod tcp;
mod transport;

pub use client::{BlobClient, DEFAULT_TIMEOUT};
pub use error::{BlobErr, Result};
pub use memory::{MemoryBlobs, content_ref};
pub use service::BlobService;
pub use tcp::TcpBlobs;
pub use transport::BlobTransport;
