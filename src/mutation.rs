use crate::population::PopulationState;
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};

/// Fraction of the mutator bin moved to its neighbour.
pub const MUT_FRACTION: f64 = 0.1;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Population {
    Host,
    Parasite,
}

/// A mutation event that moved density from bin `from` to bin `to`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Mutation {
    pub population: Population,
    pub from: usize,
    pub to: usize,
}

/// Perform one mutation event.
///
/// Picks the host population with probability `who`, a mutator bin with
/// probability proportional to its density, and a direction by coin flip, then
/// moves [`MUT_FRACTION`] of the mutator bin into the neighbouring bin. Host
/// events move `x0` and the matching row of `y0`; parasite events move `y` and
/// the matching column of `y0`.
///
/// Returns `None` when nothing moved: the chosen population has no density,
/// the direction points outside the trait axis, or the coin landed on 0.5.
pub fn mutate<R: RandomSource>(
    state: &mut PopulationState,
    who: f64,
    rng: &mut R,
) -> Option<Mutation> {
    let population = if rng.uniform() < who {
        Population::Host
    } else {
        Population::Parasite
    };

    let density = match population {
        Population::Host => &state.x0,
        Population::Parasite => &state.y,
    };
    let total: f64 = density.iter().sum();
    if total <= 0.0 {
        return None;
    }

    let r1 = rng.uniform();
    let from = select_mutator(density, total, r1)?;

    let r2 = rng.uniform();
    let n_bins = state.n_bins();
    let to = if r2 < 0.5 && from > 0 {
        from - 1
    } else if r2 > 0.5 && from < n_bins - 1 {
        from + 1
    } else {
        return None;
    };

    match population {
        Population::Host => {
            transfer(&mut state.x0, from, to);
            for i_par in 0..n_bins {
                let moved = MUT_FRACTION * state.y0[(from, i_par)];
                state.y0[(from, i_par)] -= moved;
                state.y0[(to, i_par)] += moved;
            }
        }
        Population::Parasite => {
            transfer(&mut state.y, from, to);
            for i_host in 0..n_bins {
                let moved = MUT_FRACTION * state.y0[(i_host, from)];
                state.y0[(i_host, from)] -= moved;
                state.y0[(i_host, to)] += moved;
            }
        }
    }

    Some(Mutation {
        population,
        from,
        to,
    })
}

/// Roulette-wheel pick: first bin whose cumulative share of `total` exceeds `r1`.
fn select_mutator(density: &[f64], total: f64, r1: f64) -> Option<usize> {
    let mut cum = 0.0;
    for (i, &val) in density.iter().enumerate() {
        cum += val;
        if r1 < cum / total {
            return Some(i);
        }
    }
    // Rounding can leave the last share just below `r1`.
    density.iter().rposition(|&val| val > 0.0)
}

fn transfer(density: &mut [f64], from: usize, to: usize) {
    let moved = MUT_FRACTION * density[from];
    density[from] -= moved;
    density[to] += moved;
}
