//! Trade-off curves relating trait values to host and parasite costs.

use crate::config::check_num;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Trait ranges and trade-off shape parameters.
///
/// `u` is the host trait on `[umin, umax]` with cost `a` between `amin` and
/// `amax`; `v` is the parasite trait on `[vmin, vmax]` with cost `beta` between
/// `betmin` and `bemaxtime`. `a_p` and `beta_p` set the curvature.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostParams {
    pub umin: f64,
    pub umax: f64,
    pub amin: f64,
    pub amax: f64,
    pub a_p: f64,

    pub vmin: f64,
    pub vmax: f64,
    pub betmin: f64,
    pub bemaxtime: f64,
    pub beta_p: f64,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            umin: 0.0,
            umax: 10.0,
            amin: 1.782,
            amax: 5.454,
            a_p: 2.615,
            vmin: 0.0,
            vmax: 10.0,
            betmin: 0.491,
            bemaxtime: 17.117,
            beta_p: -0.434,
        }
    }
}

impl CostParams {
    pub fn validate(&self) -> Result<()> {
        check_range(self.umin, self.umax).context("invalid host trait range")?;
        check_range(self.vmin, self.vmax).context("invalid parasite trait range")?;

        check_num(self.amin, -1e6..1e6).context("invalid minimum host cost")?;
        check_num(self.amax, -1e6..1e6).context("invalid maximum host cost")?;
        check_num(self.betmin, -1e6..1e6).context("invalid minimum parasite cost")?;
        check_num(self.bemaxtime, -1e6..1e6).context("invalid maximum parasite cost")?;

        check_shape(self.a_p).context("invalid host trade-off shape")?;
        check_shape(self.beta_p).context("invalid parasite trade-off shape")?;

        Ok(())
    }
}

fn check_range(min: f64, max: f64) -> Result<()> {
    if !(min.is_finite() && max.is_finite()) {
        bail!("range bounds must be finite, but are {min:?} and {max:?}");
    }
    if min >= max {
        bail!("range minimum must be below the maximum, but {min:?} >= {max:?}");
    }
    Ok(())
}

// The denominator `1 + p * s` must stay positive for `s` in `[0, 1]`.
fn check_shape(p: f64) -> Result<()> {
    if !(p.is_finite() && p > -1.0) {
        bail!("shape must be finite and greater than -1, but is {p:?}");
    }
    Ok(())
}

fn trade_off(t: f64, t_min: f64, t_max: f64, c_min: f64, c_max: f64, p: f64) -> f64 {
    let s = (t - t_max) / (t_min - t_max);
    c_max - (c_max - c_min) * (1.0 - s) / (1.0 + p * s)
}

/// Host cost `a` at trait value `u`.
pub fn host_cost(u: f64, cp: &CostParams) -> f64 {
    trade_off(u, cp.umin, cp.umax, cp.amin, cp.amax, cp.a_p)
}

/// Parasite cost `beta` at trait value `v`.
pub fn parasite_cost(v: f64, cp: &CostParams) -> f64 {
    trade_off(v, cp.vmin, cp.vmax, cp.betmin, cp.bemaxtime, cp.beta_p)
}

/// Per-bin host and parasite cost curves `(a, beta)`.
pub fn cost_vectors(u: &[f64], v: &[f64], cp: &CostParams) -> (Vec<f64>, Vec<f64>) {
    let a = u.iter().map(|&u_i| host_cost(u_i, cp)).collect();
    let beta = v.iter().map(|&v_j| parasite_cost(v_j, cp)).collect();
    (a, beta)
}
