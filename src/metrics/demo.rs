//! Random data source for trying out displays without hardware.

use crate::error::Result;
use crate::metrics::{
    data::{MetricKind, Reading},
    traits::Sampler,
};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Produces `number1` in `1..=200` and `number2` in `0..=100`.
pub struct DemoSampler {
    rng: StdRng,
}

impl DemoSampler {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sampler for tests and benchmarks.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for DemoSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sampler for DemoSampler {
    fn kinds(&self) -> &[MetricKind] {
        &MetricKind::DEMO
    }

    async fn sample(&mut self) -> Result<Reading> {
        Ok(Reading::new()
            .with(MetricKind::Number1, self.rng.gen_range(1..=200) as f64)
            .with(MetricKind::Number2, self.rng.gen_range(0..=100) as f64))
    }
}
