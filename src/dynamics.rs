//! Right-hand side of the coupled host-parasite equations.
//!
//! Only selected bins take part: the state vector holds `x0[i]` for every
//! integrated host row `i`, followed by `y0[i][j]` for every such row (outer)
//! and active parasite `j` (inner). Everything else is left untouched.

use crate::config::{DynamicsConfig, DynamicsKind};
use crate::landscape::Landscape;
use crate::population::PopulationState;

/// Autonomous system `dy/dt = f(y)`.
pub trait Dynamics {
    fn derivs(&self, y: &[f64], dydt: &mut [f64]);
}

/// Host-parasite system restricted to the currently active bins.
pub struct Coevolution<'a> {
    land: &'a Landscape,
    params: &'a DynamicsConfig,
    host: &'a [usize],
    par: &'a [usize],
}

impl<'a> Coevolution<'a> {
    pub fn new(
        land: &'a Landscape,
        params: &'a DynamicsConfig,
        host: &'a [usize],
        par: &'a [usize],
    ) -> Self {
        Self {
            land,
            params,
            host,
            par,
        }
    }

    pub fn dim(&self) -> usize {
        self.host.len() * (1 + self.par.len())
    }

    pub fn pack(&self, state: &PopulationState) -> Vec<f64> {
        let mut y = Vec::with_capacity(self.dim());
        y.extend(self.host.iter().map(|&i| state.x0[i]));
        for &i in self.host {
            let row = state.y0.row(i);
            y.extend(self.par.iter().map(|&j| row[j]));
        }
        y
    }

    pub fn unpack(&self, y: &[f64], state: &mut PopulationState) {
        let (x, inf) = y.split_at(self.host.len());
        for (&i, &x_i) in self.host.iter().zip(x) {
            state.x0[i] = x_i;
        }
        for (&i, row) in self.host.iter().zip(inf.chunks_exact(self.par.len().max(1))) {
            for (&j, &y_ij) in self.par.iter().zip(row) {
                state.y0[(i, j)] = y_ij;
            }
        }
    }

    fn epidemic(&self, y: &[f64], dydt: &mut [f64]) {
        let p = self.params;
        let nh = self.host.len();
        let np = self.par.len();
        let (x, inf) = y.split_at(nh);
        let (dx, dinf) = dydt.split_at_mut(nh);

        let mut par_tot = vec![0.0; np];
        for row in inf.chunks_exact(np.max(1)) {
            for (tot, &y_ij) in par_tot.iter_mut().zip(row) {
                *tot += y_ij;
            }
        }
        let n_host_tot = x.iter().sum::<f64>() + inf.iter().sum::<f64>();
        let removal = p.alpha + p.b + p.gamma;

        for (ih, &i) in self.host.iter().enumerate() {
            let x_i = x[ih];
            let row = &inf[ih * np..(ih + 1) * np];
            let drow = &mut dinf[ih * np..(ih + 1) * np];

            let mut force = 0.0;
            for (jp, &j) in self.par.iter().enumerate() {
                let e_ij = self.land.e[(i, j)];
                force += e_ij * par_tot[jp];
                drow[jp] = e_ij * x_i * par_tot[jp] - removal * row[jp];
            }
            let recovered: f64 = row.iter().sum();

            dx[ih] = x_i * (self.land.a[i] - p.q * n_host_tot) - p.b * x_i - x_i * force
                + p.gamma * recovered;
        }
    }

    fn coupled(&self, y: &[f64], dydt: &mut [f64]) {
        let nh = self.host.len();
        let np = self.par.len();
        let (x, inf) = y.split_at(nh);
        let (dx, dinf) = dydt.split_at_mut(nh);

        for (ih, &i) in self.host.iter().enumerate() {
            let x_i = x[ih];
            let row = &inf[ih * np..(ih + 1) * np];
            let drow = &mut dinf[ih * np..(ih + 1) * np];

            let mut gain = 0.0;
            for (jp, &j) in self.par.iter().enumerate() {
                let e_ij = self.land.e[(i, j)];
                gain += e_ij * row[jp];
                drow[jp] = row[jp] * (e_ij * x_i - self.land.beta[j]);
            }

            dx[ih] = x_i * (gain - self.land.a[i]);
        }
    }
}

impl Dynamics for Coevolution<'_> {
    fn derivs(&self, y: &[f64], dydt: &mut [f64]) {
        match self.params.kind {
            DynamicsKind::Epidemic => self.epidemic(y, dydt),
            DynamicsKind::Coupled => self.coupled(y, dydt),
        }
    }
}
