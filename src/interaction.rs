use ndarray::Array2;

/// Strength of parasite `j` on host `i` for traits `u_i`, `v_j` and parasite cost `beta_j`.
///
/// A logistic weight of the trait difference scales `beta_j`: the weight is 1/2 at
/// equal traits and tends to 1 as the parasite trait overtakes the host trait.
pub fn interaction(u_i: f64, v_j: f64, beta_j: f64) -> f64 {
    beta_j * (1.0 - 1.0 / (1.0 + (-2.0 * (u_i - v_j)).exp()))
}

/// Host-by-parasite interaction matrix `E`.
pub fn interaction_matrix(u: &[f64], v: &[f64], beta: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((u.len(), v.len()), |(i, j)| interaction(u[i], v[j], beta[j]))
}
