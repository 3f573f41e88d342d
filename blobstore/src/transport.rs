use comms::specs::ContentRef;

use crate::Result;

/// The raw access to a content-addressed store.
#[allow(unused)]
#[trait_variant::make(BlobTransport: Send)]
pub trait LocalBlobTransport: Sync {
    /// Stores `bytes` and returns the reference the store derived for them, unvalidated.
    async fn add(&self, bytes: &[u8]) -> Result<String>;

    /// Fetches the payload stored under `reference`.
    async fn cat(&self, reference: &ContentRef) -> Result<Vec<u8>>;
}
