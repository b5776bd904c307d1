//! Population densities, extinction handling and the per-step presence scan.

use crate::config::InitConfig;
use crate::rng::RandomSource;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Coexistence status found by a presence scan.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Coexisting,
    HostsExtinct,
    ParasitesExtinct,
}

/// Bins with strictly positive density, rebuilt every step.
#[derive(Debug, Default, Clone)]
pub struct ActivePhenotypes {
    /// Active host bins in ascending order.
    pub host: Vec<usize>,
    /// Active parasite bins in ascending order.
    pub par: Vec<usize>,
}

impl ActivePhenotypes {
    pub fn with_capacity(n_bins: usize) -> Self {
        Self {
            host: Vec::with_capacity(n_bins),
            par: Vec::with_capacity(n_bins),
        }
    }

    pub fn nh(&self) -> usize {
        self.host.len()
    }

    pub fn np(&self) -> usize {
        self.par.len()
    }
}

/// Mutable simulation state.
#[derive(Debug, PartialEq, Clone)]
pub struct PopulationState {
    /// Host density per bin.
    pub x0: Vec<f64>,
    /// Joint density (row = host bin, column = parasite bin).
    pub y0: Array2<f64>,
    /// Parasite marginal density, the column sums of `y0`.
    pub y: Vec<f64>,
}

impl PopulationState {
    pub fn zeros(n_bins: usize) -> Self {
        Self {
            x0: vec![0.0; n_bins],
            y0: Array2::zeros((n_bins, n_bins)),
            y: vec![0.0; n_bins],
        }
    }

    /// Initial state: `n_seeds` random (host, parasite) pairs set to unit density.
    ///
    /// Each pair draws the host bin first, then the parasite bin. Repeated
    /// draws land on cells that are already set.
    pub fn seed<R: RandomSource>(n_bins: usize, n_seeds: usize, rng: &mut R) -> Self {
        Self::seed_from(n_bins, n_seeds, &InitConfig::default(), rng)
    }

    /// Like [`PopulationState::seed`], but a start bin fixed in `init` replaces
    /// the corresponding draw.
    pub fn seed_from<R: RandomSource>(
        n_bins: usize,
        n_seeds: usize,
        init: &InitConfig,
        rng: &mut R,
    ) -> Self {
        let mut state = Self::zeros(n_bins);
        for _ in 0..n_seeds {
            let h = init.host_start.unwrap_or_else(|| rng.index(n_bins));
            let p = init.par_start.unwrap_or_else(|| rng.index(n_bins));
            state.x0[h] = 1.0;
            state.y0[(h, p)] = 1.0;
        }
        state.update_marginal();
        state
    }

    pub fn n_bins(&self) -> usize {
        self.x0.len()
    }

    pub fn host_total(&self) -> f64 {
        self.x0.iter().sum()
    }

    pub fn parasite_total(&self) -> f64 {
        self.y.iter().sum()
    }

    pub fn joint_total(&self) -> f64 {
        self.y0.sum()
    }

    /// Recompute `y` as the column sums of `y0`.
    pub fn update_marginal(&mut self) {
        self.y = self.y0.sum_axis(Axis(0)).to_vec();
    }

    /// Host bins holding any mass, free (`x0`) or joint (`y0` row).
    ///
    /// A row whose `x0` was clamped away can still hold joint density, which has
    /// to keep evolving even though the bin is not an active host.
    pub fn occupied_rows(&self) -> Vec<usize> {
        self.y0
            .rows()
            .into_iter()
            .zip(&self.x0)
            .enumerate()
            .filter(|(_, (row, x))| **x > 0.0 || row.iter().any(|&c| c > 0.0))
            .map(|(i, _)| i)
            .collect()
    }

    /// Rebuild `active` from the current densities and apply extinction.
    ///
    /// With no host left every density is zeroed; with no parasite left the
    /// parasite densities are zeroed. The scan always visits every bin.
    pub fn scan(&mut self, active: &mut ActivePhenotypes) -> Presence {
        active.host.clear();
        active.par.clear();

        for (i, (&x, &y)) in self.x0.iter().zip(&self.y).enumerate() {
            if x > 0.0 {
                active.host.push(i);
            }
            if y > 0.0 {
                active.par.push(i);
            }
        }

        if active.nh() == 0 {
            self.x0.fill(0.0);
            self.y0.fill(0.0);
            self.y.fill(0.0);
            active.par.clear();
            return Presence::HostsExtinct;
        }
        if active.np() == 0 {
            self.y0.fill(0.0);
            self.y.fill(0.0);
            return Presence::ParasitesExtinct;
        }
        Presence::Coexisting
    }

    /// Force densities below `epsilon` to zero and refresh the parasite marginal.
    pub fn clamp(&mut self, epsilon: f64) {
        for x in &mut self.x0 {
            if *x < epsilon {
                *x = 0.0;
            }
        }
        for cell in self.y0.iter_mut() {
            if *cell < epsilon {
                *cell = 0.0;
            }
        }
        self.update_marginal();
        for y in &mut self.y {
            if *y < epsilon {
                *y = 0.0;
            }
        }
    }
}
