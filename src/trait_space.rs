//! Mapping from phenotype bins to continuous trait values.

/// Trait value of bin `i` on an axis spanning `[min, max]` with `n_bins` bins.
///
/// Requires `n_bins > 1`; this is enforced when the configuration is validated.
pub fn trait_value(i: usize, n_bins: usize, min: f64, max: f64) -> f64 {
    min + (max - min) * i as f64 / (n_bins - 1) as f64
}

/// Trait values of every bin on an axis, in ascending bin order.
pub fn trait_vector(n_bins: usize, min: f64, max: f64) -> Vec<f64> {
    (0..n_bins)
        .map(|i| trait_value(i, n_bins, min, max))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_match_range() {
        for n_bins in [2, 3, 10, 101] {
            let u = trait_vector(n_bins, -2.5, 7.0);
            assert_eq!(u.len(), n_bins);
            assert_eq!(u[0], -2.5);
            assert_eq!(u[n_bins - 1], 7.0);
        }
    }

    #[test]
    fn strictly_increasing() {
        for n_bins in 2..64 {
            let v = trait_vector(n_bins, 0.0, 10.0);
            assert!(v.windows(2).all(|w| w[0] < w[1]), "n_bins = {n_bins}");
        }
    }

    #[test]
    fn evenly_spaced() {
        let u = trait_vector(5, 0.0, 10.0);
        assert_eq!(u, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
        assert_eq!(trait_value(3, 5, 0.0, 10.0), 7.5);
    }
}
