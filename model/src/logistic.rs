use log::debug;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use rand_distr::StandardNormal;

use crate::{Dataset, ModelErr, Result, TrainableModel, codec};

/// The hyperparameters of a local update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            batch_size: 16,
            learning_rate: 0.1,
            seed: 0,
        }
    }
}

/// A binary logistic regression classifier.
///
/// The parameters are the weights followed by the bias.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    params: Vec<f32>,
    config: TrainConfig,
    train: Option<Dataset>,
    test: Option<Dataset>,
    rng: StdRng,
}

impl LogisticModel {
    /// Creates a new `LogisticModel` with every parameter set to zero.
    ///
    /// # Arguments
    /// * `features` - The dimension of the samples.
    pub fn new(features: usize) -> Self {
        let config = TrainConfig::default();

        Self {
            params: vec![0.0; features + 1],
            config,
            train: None,
            test: None,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Creates a new `LogisticModel` with small random weights.
    pub fn random(features: usize, seed: u64) -> Self {
        let mut model = Self::new(features);
        let mut rng = StdRng::seed_from_u64(seed);

        model
            .params
            .iter_mut()
            .for_each(|p| *p = 0.01 * rng.sample::<f32, _>(StandardNormal));

        model
    }

    pub fn with_config(mut self, config: TrainConfig) -> Self {
        self.config = config;
        self.rng = StdRng::seed_from_u64(config.seed);
        self
    }

    pub fn with_train_data(mut self, data: Dataset) -> Self {
        self.train = Some(data);
        self
    }

    pub fn with_test_data(mut self, data: Dataset) -> Self {
        self.test = Some(data);
        self
    }

    pub fn features(&self) -> usize {
        self.params.len() - 1
    }

    fn split(&self) -> (ArrayView1<'_, f32>, f32) {
        let (w, b) = self.params.split_at(self.features());
        (ArrayView1::from(w), b[0])
    }

    fn predict(&self, x: ArrayView2<f32>) -> Array1<f32> {
        let (w, b) = self.split();
        x.dot(&w).mapv(|z| sigmoid(z + b))
    }

    fn check_features(&self, data: &Dataset) -> Result<()> {
        if data.features() != self.features() {
            return Err(ModelErr::SizeMismatch {
                a: "dataset features",
                b: "model weights",
                got: data.features(),
                expected: self.features(),
            });
        }

        if data.is_empty() {
            return Err(ModelErr::EmptyDataset);
        }

        Ok(())
    }
}

impl TrainableModel for LogisticModel {
    fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let params = codec::decode(bytes)?;

        if params.len() != self.params.len() {
            return Err(ModelErr::SizeMismatch {
                a: "encoded parameters",
                b: "model parameters",
                got: params.len(),
                expected: self.params.len(),
            });
        }

        self.params = params;
        Ok(())
    }

    fn save_bytes(&self) -> Vec<u8> {
        codec::encode(&self.params)
    }

    fn local_update(&mut self) -> Result<f32> {
        let data = self.train.take().ok_or(ModelErr::MissingDataset("training"))?;
        let res = self.fit(&data);
        self.train = Some(data);
        res
    }

    fn evaluate(&self) -> Result<f32> {
        let data = self.test.as_ref().ok_or(ModelErr::MissingDataset("test"))?;
        self.check_features(data)?;

        let hits = self
            .predict(data.x())
            .iter()
            .zip(data.y())
            .filter(|&(&p, &y)| (p >= 0.5) == (y >= 0.5))
            .count();

        Ok(hits as f32 / data.len() as f32)
    }

    fn params(&self) -> &[f32] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }
}

impl LogisticModel {
    /// Mini batch gradient descent over `data` for the configured epochs.
    fn fit(&mut self, data: &Dataset) -> Result<f32> {
        self.check_features(data)?;

        let TrainConfig {
            epochs,
            batch_size,
            learning_rate,
            ..
        } = self.config;

        let features = self.features();
        let mut indices: Vec<usize> = (0..data.len()).collect();
        let mut loss = 0.0;

        for epoch in 0..epochs {
            indices.shuffle(&mut self.rng);
            let mut total = 0.0;

            for chunk in indices.chunks(batch_size.max(1)) {
                let (x, y) = data.batch(chunk);
                let p = self.predict(x.view());
                total += cross_entropy(p.view(), y.view()) * chunk.len() as f32;

                let err = &p - &y;
                let n = chunk.len() as f32;
                let dw = x.t().dot(&err) / n;
                let db = err.sum() / n;

                let (w, b) = self.params.split_at_mut(features);
                w.iter_mut()
                    .zip(dw.iter())
                    .for_each(|(w, dw)| *w -= learning_rate * dw);
                b[0] -= learning_rate * db;
            }

            loss = total / data.len() as f32;
            debug!(epoch = epoch, loss = loss; "local epoch done");
        }

        Ok(loss)
    }
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

fn cross_entropy(p: ArrayView1<f32>, y: ArrayView1<f32>) -> f32 {
    const EPS: f32 = 1e-7;

    p.iter()
        .zip(y)
        .map(|(&p, &y)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum::<f32>()
        / p.len() as f32
}
