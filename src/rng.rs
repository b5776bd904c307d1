use anyhow::Result;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;

/// Source of the random draws used by seeding and mutation.
pub trait RandomSource {
    /// Uniform real in `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// Uniform integer in `[0, n)`.
    fn index(&mut self, n: usize) -> usize;
}

/// Production random source backed by ChaCha12.
pub struct ChaChaSource {
    rng: ChaCha12Rng,
    unit: Uniform<f64>,
}

impl ChaChaSource {
    pub fn from_seed(seed: u64) -> Result<Self> {
        Self::with_rng(ChaCha12Rng::seed_from_u64(seed))
    }

    pub fn from_os() -> Result<Self> {
        Self::with_rng(ChaCha12Rng::try_from_os_rng()?)
    }

    fn with_rng(rng: ChaCha12Rng) -> Result<Self> {
        let unit = Uniform::new(0.0, 1.0)?;
        Ok(Self { rng, unit })
    }
}

impl RandomSource for ChaChaSource {
    fn uniform(&mut self) -> f64 {
        self.unit.sample(&mut self.rng)
    }

    fn index(&mut self, n: usize) -> usize {
        self.rng.random_range(0..n)
    }
}

/// Replays fixed sequences of draws; panics once a sequence runs out.
#[cfg(test)]
pub struct Scripted {
    reals: std::collections::VecDeque<f64>,
    indices: std::collections::VecDeque<usize>,
}

#[cfg(test)]
impl Scripted {
    pub fn new(reals: &[f64], indices: &[usize]) -> Self {
        Self {
            reals: reals.iter().copied().collect(),
            indices: indices.iter().copied().collect(),
        }
    }

    pub fn remaining(&self) -> (usize, usize) {
        (self.reals.len(), self.indices.len())
    }
}

#[cfg(test)]
impl RandomSource for Scripted {
    fn uniform(&mut self) -> f64 {
        self.reals.pop_front().expect("scripted reals exhausted")
    }

    fn index(&mut self, n: usize) -> usize {
        let idx = self.indices.pop_front().expect("scripted indices exhausted");
        assert!(idx < n, "scripted index {idx} out of range 0..{n}");
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_stay_in_range() {
        let mut src = ChaChaSource::from_seed(11).unwrap();
        for _ in 0..1000 {
            let r = src.uniform();
            assert!((0.0..1.0).contains(&r));
            assert!(src.index(7) < 7);
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut src_a = ChaChaSource::from_seed(3).unwrap();
        let mut src_b = ChaChaSource::from_seed(3).unwrap();
        for _ in 0..100 {
            assert_eq!(src_a.uniform().to_bits(), src_b.uniform().to_bits());
            assert_eq!(src_a.index(50), src_b.index(50));
        }
    }

    #[test]
    fn scripted_replays_in_order() {
        let mut src = Scripted::new(&[0.25, 0.75], &[4, 1]);
        assert_eq!(src.uniform(), 0.25);
        assert_eq!(src.index(5), 4);
        assert_eq!(src.remaining(), (1, 1));
    }
}
