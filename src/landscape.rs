use crate::costs::{CostParams, cost_vectors};
use crate::interaction::interaction_matrix;
use crate::trait_space::trait_vector;
use ndarray::Array2;

/// Static per-configuration tables: traits, costs and interaction strengths.
#[derive(Debug, Clone)]
pub struct Landscape {
    /// Host trait values.
    pub u: Vec<f64>,
    /// Parasite trait values.
    pub v: Vec<f64>,
    /// Host cost per bin.
    pub a: Vec<f64>,
    /// Parasite cost per bin.
    pub beta: Vec<f64>,
    /// Interaction matrix (row = host bin, column = parasite bin).
    pub e: Array2<f64>,
}

impl Landscape {
    pub fn new(n_bins: usize, cp: &CostParams) -> Self {
        let u = trait_vector(n_bins, cp.umin, cp.umax);
        let v = trait_vector(n_bins, cp.vmin, cp.vmax);
        let (a, beta) = cost_vectors(&u, &v, cp);
        let e = interaction_matrix(&u, &v, &beta);
        Self { u, v, a, beta, e }
    }

    pub fn n_bins(&self) -> usize {
        self.u.len()
    }
}
