//! Injectable source of randomness.
//!
//! Every probabilistic decision in the simulation (battery drain amount,
//! random disconnects, recoveries, sensor values) draws from a
//! [`RandomSource`]. Production code uses [`StdRandom`]; tests script exact
//! sequences with [`MockRandom`](crate::hal::MockRandom).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform random numbers in `[0, 1)`.
pub trait RandomSource {
    /// Next sample, uniformly distributed in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Sample uniformly in `[low, high)`.
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_unit() * (high - low)
    }

    /// Returns `true` with the given probability.
    ///
    /// A probability of `0.0` never fires, `1.0` always fires.
    fn chance(&mut self, probability: f64) -> bool {
        self.next_unit() < probability
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// Random source backed by `rand`'s standard RNG.
#[derive(Debug, Clone)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Seed from operating system entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic source for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}
