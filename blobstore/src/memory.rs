use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use comms::specs::ContentRef;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::{BlobErr, BlobTransport, Result};

/// The reference a payload is stored under, `sha256:` followed by its hex digest.
pub fn content_ref(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// An in-process store shared between every clone.
#[derive(Clone, Default)]
pub struct MemoryBlobs {
    blobs: Arc<RwLock<HashMap<String, Arc<[u8]>>>>,
    offline: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::Release);
    }

    /// Delays every operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Release);
    }

    /// Drops the payload stored under `reference`, returns whether there was one.
    pub fn remove(&self, reference: &str) -> bool {
        self.blobs.write().remove(reference).is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn insert(&self, bytes: &[u8]) -> String {
        let reference = content_ref(bytes);
        self.blobs
            .write()
            .entry(reference.clone())
            .or_insert_with(|| Arc::from(bytes));
        reference
    }

    pub(crate) fn lookup(&self, reference: &str) -> Option<Arc<[u8]>> {
        self.blobs.read().get(reference).cloned()
    }

    async fn reach(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::Acquire);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.offline.load(Ordering::Acquire) {
            let e = io::Error::new(io::ErrorKind::ConnectionRefused, "blob store is offline");
            return Err(BlobErr::StoreUnavailable(e));
        }

        Ok(())
    }
}

impl BlobTransport for MemoryBlobs {
    async fn add(&self, bytes: &[u8]) -> Result<String> {
        self.reach().await?;
        Ok(self.insert(bytes))
    }

    async fn cat(&self, reference: &ContentRef) -> Result<Vec<u8>> {
        self.reach().await?;

        self.lookup(reference)
            .map(|blob| blob.to_vec())
            .ok_or_else(|| BlobErr::NotFound(reference.clone()))
    }
}
