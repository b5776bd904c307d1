use crate::observer::{Observer, Snapshot};
use anyhow::Result;

/// Density-weighted mean and standard deviation of a trait distribution.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Moments {
    pub mean: f64,
    pub std_dev: f64,
}

/// Moments of `traits` weighted by `density`, or `None` if the density is empty.
pub fn weighted_moments(traits: &[f64], density: &[f64]) -> Option<Moments> {
    let total: f64 = density.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let mean = traits
        .iter()
        .zip(density)
        .map(|(&t, &d)| t * d)
        .sum::<f64>()
        / total;
    let var = traits
        .iter()
        .zip(density)
        .map(|(&t, &d)| d * (t - mean).powi(2))
        .sum::<f64>()
        / total;
    Some(Moments {
        mean,
        std_dev: var.sqrt(),
    })
}

/// Running mean and variance (Welford).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn n_vals(&self) -> usize {
        self.n_vals
    }

    pub fn mean(&self) -> f64 {
        if self.n_vals > 0 { self.mean } else { f64::NAN }
    }

    pub fn std_dev(&self) -> f64 {
        if self.n_vals > 1 {
            (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
        } else {
            f64::NAN
        }
    }
}

/// Tracks the mean host and parasite traits over the snapshots of a run.
pub struct TraitSummary {
    host: Accumulator,
    par: Accumulator,
}

impl TraitSummary {
    pub fn new() -> Self {
        Self {
            host: Accumulator::new(),
            par: Accumulator::new(),
        }
    }
}

impl Observer for TraitSummary {
    fn observe(&mut self, snap: &Snapshot<'_>) -> Result<()> {
        if let Some(m) = weighted_moments(snap.u, snap.x0) {
            self.host.add(m.mean);
        }
        if let Some(m) = weighted_moments(snap.v, snap.y) {
            self.par.add(m.mean);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for (name, acc) in [("host", &self.host), ("parasite", &self.par)] {
            log::info!(
                "{name} mean trait {:.4} (std dev {:.4}) over {} snapshots",
                acc.mean(),
                acc.std_dev(),
                acc.n_vals()
            );
        }
        Ok(())
    }
}
