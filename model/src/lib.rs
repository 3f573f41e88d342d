//! The trainable model capability and a reference implementation.
//!
//! Components never look inside a model, they load it from bytes, run a local update,
//! export it back to bytes and evaluate it. Aggregation additionally reads and writes
//! the flat parameter vector.

pub mod codec;
mod dataset;
mod error;
mod logistic;

pub use dataset::Dataset;
pub use error::{ModelErr, Result};
pub use logistic::{LogisticModel, TrainConfig};

/// What a federated component needs from a model.
pub trait TrainableModel: Send {
    /// Replaces the parameters with the ones encoded in `bytes`.
    fn load_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Encodes the current parameters.
    fn save_bytes(&self) -> Vec<u8>;

    /// Trains on the local dataset starting from the current parameters.
    ///
    /// # Returns
    /// The mean loss of the last epoch.
    fn local_update(&mut self) -> Result<f32>;

    /// The accuracy in `[0, 1]` against the fixed evaluation dataset.
    fn evaluate(&self) -> Result<f32>;

    fn params(&self) -> &[f32];

    fn params_mut(&mut self) -> &mut [f32];
}
