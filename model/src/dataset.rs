use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;

/// Seeds the decision boundary every synthetic dataset shares.
const BOUNDARY_SEED: u64 = 0x5eed;

/// Labeled samples for a binary classifier.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array1<f32>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `x` - One sample per row.
    /// * `y` - One label per sample, either 0 or 1.
    ///
    /// # Returns
    /// The dataset, or `None` if the amount of samples and labels differ.
    pub fn new(x: Array2<f32>, y: Array1<f32>) -> Option<Self> {
        (x.nrows() == y.len()).then_some(Self { x, y })
    }

    /// Draws `samples` points labeled by a linear boundary that's the same for every seed.
    ///
    /// # Arguments
    /// * `features` - The dimension of each sample.
    /// * `samples` - The amount of samples.
    /// * `seed` - Picks which points are drawn.
    pub fn synthetic(features: usize, samples: usize, seed: u64) -> Self {
        let mut boundary_rng = StdRng::seed_from_u64(BOUNDARY_SEED);
        let boundary: Array1<f32> = (0..features)
            .map(|_| boundary_rng.sample::<f32, _>(StandardNormal))
            .collect();

        let mut rng = StdRng::seed_from_u64(seed);
        let x = Array2::from_shape_simple_fn((samples, features), || {
            rng.sample::<f32, _>(StandardNormal)
        });
        let y = x
            .dot(&boundary)
            .mapv(|z| if z > 0.0 { 1.0 } else { 0.0 });

        Self { x, y }
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn features(&self) -> usize {
        self.x.ncols()
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView1<'_, f32> {
        self.y.view()
    }

    /// Copies the rows at `indices` into a new batch.
    pub fn batch(&self, indices: &[usize]) -> (Array2<f32>, Array1<f32>) {
        (self.x.select(Axis(0), indices), self.y.select(Axis(0), indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_data_is_reproducible() {
        let a = Dataset::synthetic(4, 32, 7);
        let b = Dataset::synthetic(4, 32, 7);

        assert_eq!(a.x(), b.x());
        assert_eq!(a.y(), b.y());
        assert_eq!(a.len(), 32);
        assert_eq!(a.features(), 4);
    }

    #[test]
    fn labels_are_binary_and_mixed() {
        let data = Dataset::synthetic(3, 200, 1);
        let positives = data.y().iter().filter(|&&y| y == 1.0).count();

        assert!(data.y().iter().all(|&y| y == 0.0 || y == 1.0));
        assert!(positives > 0 && positives < 200);
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        assert!(Dataset::new(Array2::zeros((3, 2)), Array1::zeros(2)).is_none());
    }
}
