use std::{future::Future, time::Duration};

use comms::specs::ContentRef;
use log::{debug, warn};

use crate::{BlobErr, BlobTransport, Result};

/// How long any single blob operation may take unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Uploads and downloads opaque payloads by content reference.
///
/// Cloning is cheap as long as the transport's is, so concurrent downloads can each
/// own a client.
#[derive(Clone)]
pub struct BlobClient<T: BlobTransport> {
    transport: T,
    timeout: Duration,
}

impl<T: BlobTransport> BlobClient<T> {
    /// Creates a new `BlobClient` with the default timeout.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Stores `bytes`.
    ///
    /// # Returns
    /// The reference of the stored payload.
    ///
    /// # Errors
    /// `EmptyReference` if the store answers with a blank reference.
    pub async fn put(&self, bytes: &[u8]) -> Result<ContentRef> {
        let raw = self.bounded("put", self.transport.add(bytes)).await?;

        let reference = ContentRef::parse(raw).map_err(|_| BlobErr::EmptyReference)?;
        debug!(reference = reference.as_str(), size = bytes.len(); "blob stored");
        Ok(reference)
    }

    /// Fetches the payload behind `reference`.
    ///
    /// # Errors
    /// `InvalidReference` for an empty or blank reference, without any network call.
    pub async fn get(&self, reference: &str) -> Result<Vec<u8>> {
        let reference = ContentRef::parse(reference)
            .map_err(|e| BlobErr::InvalidReference(e.raw().to_string()))?;

        self.fetch(&reference).await
    }

    /// Fetches the payload behind an already validated reference.
    pub async fn fetch(&self, reference: &ContentRef) -> Result<Vec<u8>> {
        let bytes = self.bounded("get", self.transport.cat(reference)).await?;
        debug!(reference = reference.as_str(), size = bytes.len(); "blob fetched");
        Ok(bytes)
    }

    async fn bounded<V, F>(&self, op: &'static str, fut: F) -> Result<V>
    where
        F: Future<Output = Result<V>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => {
                warn!(op = op; "blob operation timed out");
                Err(BlobErr::Timeout {
                    op,
                    after: self.timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBlobs;

    #[tokio::test]
    async fn put_then_get_returns_the_payload() {
        let client = BlobClient::new(MemoryBlobs::new());
        let payload = b"global model".to_vec();

        let reference = client.put(&payload).await.unwrap();
        assert_eq!(client.get(&reference).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn blank_references_never_reach_the_store() {
        let store = MemoryBlobs::new();
        store.set_online(false);
        let client = BlobClient::new(store);

        for raw in ["", "   ", "\t\n"] {
            assert!(matches!(
                client.get(raw).await,
                Err(BlobErr::InvalidReference(_))
            ));
        }
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let store = MemoryBlobs::new();
        let client = BlobClient::new(store.clone()).with_timeout(Duration::from_millis(20));
        let reference = client.put(b"x").await.unwrap();

        store.set_latency(Duration::from_millis(200));
        let err = client.get(&reference).await.unwrap_err();

        assert!(matches!(err, BlobErr::Timeout { op: "get", .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let client = BlobClient::new(MemoryBlobs::new());

        let err = client.get("sha256:feed").await.unwrap_err();
        assert!(matches!(err, BlobErr::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn offline_store_is_unavailable() {
        let store = MemoryBlobs::new();
        store.set_online(false);

        let client = BlobClient::new(store);
        assert!(matches!(
            client.put(b"abc").await,
            Err(BlobErr::StoreUnavailable(_))
        ));
    }
}
