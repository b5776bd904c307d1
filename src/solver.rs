//! Adaptive Cash-Karp Runge-Kutta integration of the population dynamics.

use crate::config::{DynamicsConfig, SolverConfig};
use crate::dynamics::{Coevolution, Dynamics};
use crate::landscape::Landscape;
use crate::population::{ActivePhenotypes, PopulationState};
use anyhow::{Context, Result, bail};

/// Advances the population densities over one time window.
pub trait Integrator {
    /// Integrate the active bins of `state` in place.
    ///
    /// Host rows that still carry joint density are integrated too, so that
    /// infected hosts keep dying and recovering after the free hosts of their
    /// bin are gone.
    ///
    /// # Errors
    /// Returns an error if the integration fails to reach the end of the window.
    fn advance(
        &mut self,
        state: &mut PopulationState,
        land: &Landscape,
        active: &ActivePhenotypes,
    ) -> Result<()>;
}

const SAFETY: f64 = 0.9;
const PGROW: f64 = -0.2;
const PSHRNK: f64 = -0.25;
const ERRCON: f64 = 1.89e-4;
const TINY: f64 = 1e-30;

// Cash-Karp tableau; the systems are autonomous so the stage abscissae are not needed.
const B21: f64 = 0.2;
const B31: f64 = 3.0 / 40.0;
const B32: f64 = 9.0 / 40.0;
const B41: f64 = 0.3;
const B42: f64 = -0.9;
const B43: f64 = 1.2;
const B51: f64 = -11.0 / 54.0;
const B52: f64 = 2.5;
const B53: f64 = -70.0 / 27.0;
const B54: f64 = 35.0 / 27.0;
const B61: f64 = 1631.0 / 55296.0;
const B62: f64 = 175.0 / 512.0;
const B63: f64 = 575.0 / 13824.0;
const B64: f64 = 44275.0 / 110592.0;
const B65: f64 = 253.0 / 4096.0;
const C1: f64 = 37.0 / 378.0;
const C3: f64 = 250.0 / 621.0;
const C4: f64 = 125.0 / 594.0;
const C6: f64 = 512.0 / 1771.0;
const DC1: f64 = C1 - 2825.0 / 27648.0;
const DC3: f64 = C3 - 18575.0 / 48384.0;
const DC4: f64 = C4 - 13525.0 / 55296.0;
const DC5: f64 = -277.0 / 14336.0;
const DC6: f64 = C6 - 0.25;

/// Embedded 4(5) Runge-Kutta integrator with step-size control.
///
/// Buffers are kept between calls and resized to the current system.
pub struct CashKarp {
    cfg: SolverConfig,
    dydx: Vec<f64>,
    k: [Vec<f64>; 5],
    ytmp: Vec<f64>,
    yout: Vec<f64>,
    yerr: Vec<f64>,
    yscal: Vec<f64>,
}

impl CashKarp {
    pub fn new(cfg: SolverConfig) -> Self {
        Self {
            cfg,
            dydx: Vec::new(),
            k: Default::default(),
            ytmp: Vec::new(),
            yout: Vec::new(),
            yerr: Vec::new(),
            yscal: Vec::new(),
        }
    }

    fn resize(&mut self, n: usize) {
        for buf in [
            &mut self.dydx,
            &mut self.ytmp,
            &mut self.yout,
            &mut self.yerr,
            &mut self.yscal,
        ] {
            buf.resize(n, 0.0);
        }
        for buf in &mut self.k {
            buf.resize(n, 0.0);
        }
    }

    /// Integrate `y` from `t = 0` to `t = t_window` and return the number of steps taken.
    ///
    /// # Errors
    /// Returns an error if the step budget runs out, the step size falls below
    /// `h_min`, or the state stops being finite.
    pub fn integrate<D: Dynamics>(&mut self, sys: &D, y: &mut [f64]) -> Result<usize> {
        let n = y.len();
        if n == 0 {
            return Ok(0);
        }
        self.resize(n);

        let t_end = self.cfg.t_window;
        let mut t = 0.0;
        let mut h = self.cfg.h_init;

        for n_step in 1..=self.cfg.max_steps {
            sys.derivs(y, &mut self.dydx);
            for ((s, &y_i), &d_i) in self.yscal.iter_mut().zip(y.iter()).zip(&self.dydx) {
                *s = y_i.abs() + (h * d_i).abs() + TINY;
            }

            let last = t + h >= t_end;
            if last {
                h = t_end - t;
            }

            let (h_did, h_next) = self.adaptive_step(sys, y, h, t)?;
            t += h_did;

            if let Some(i) = y.iter().position(|y_i| !y_i.is_finite()) {
                bail!("component {i} is not finite at t = {t}");
            }
            if last && h_did == h {
                log::trace!("integrated window of {t_end} in {n_step} steps");
                return Ok(n_step);
            }
            if h_next < self.cfg.h_min {
                bail!(
                    "step size {h_next:e} fell below the minimum {:e} at t = {t}",
                    self.cfg.h_min
                );
            }
            h = h_next;
        }

        bail!(
            "step budget of {} exhausted at t = {t} before reaching t = {t_end}",
            self.cfg.max_steps
        );
    }

    /// Take one accepted step starting at `h_try`; returns the step taken and the next trial step.
    fn adaptive_step<D: Dynamics>(
        &mut self,
        sys: &D,
        y: &mut [f64],
        h_try: f64,
        t: f64,
    ) -> Result<(f64, f64)> {
        let mut h = h_try;
        loop {
            self.cash_karp_step(sys, y, h);

            let mut err_max: f64 = 0.0;
            for ((&e, &s), &out) in self.yerr.iter().zip(&self.yscal).zip(&self.yout) {
                let ratio = (e / s).abs();
                if !(ratio.is_finite() && out.is_finite()) {
                    err_max = f64::INFINITY;
                    break;
                }
                err_max = err_max.max(ratio);
            }
            err_max /= self.cfg.tol;

            if err_max <= 1.0 {
                y.copy_from_slice(&self.yout);
                let h_next = if err_max > ERRCON {
                    SAFETY * h * err_max.powf(PGROW)
                } else {
                    5.0 * h
                };
                return Ok((h, h_next));
            }

            let h_shrunk = if err_max.is_finite() {
                SAFETY * h * err_max.powf(PSHRNK)
            } else {
                0.1 * h
            };
            h = h_shrunk.max(0.1 * h);
            if t + h == t || h < self.cfg.h_min {
                bail!("step size underflow at t = {t}");
            }
        }
    }

    // Fills `yout` with the fifth-order solution and `yerr` with the embedded error estimate.
    fn cash_karp_step<D: Dynamics>(&mut self, sys: &D, y: &[f64], h: f64) {
        let n = y.len();
        let [k2, k3, k4, k5, k6] = &mut self.k;
        let dydx = &self.dydx;
        let ytmp = &mut self.ytmp;

        for i in 0..n {
            ytmp[i] = y[i] + B21 * h * dydx[i];
        }
        sys.derivs(ytmp, k2);
        for i in 0..n {
            ytmp[i] = y[i] + h * (B31 * dydx[i] + B32 * k2[i]);
        }
        sys.derivs(ytmp, k3);
        for i in 0..n {
            ytmp[i] = y[i] + h * (B41 * dydx[i] + B42 * k2[i] + B43 * k3[i]);
        }
        sys.derivs(ytmp, k4);
        for i in 0..n {
            ytmp[i] = y[i] + h * (B51 * dydx[i] + B52 * k2[i] + B53 * k3[i] + B54 * k4[i]);
        }
        sys.derivs(ytmp, k5);
        for i in 0..n {
            ytmp[i] = y[i]
                + h * (B61 * dydx[i] + B62 * k2[i] + B63 * k3[i] + B64 * k4[i] + B65 * k5[i]);
        }
        sys.derivs(ytmp, k6);

        for i in 0..n {
            self.yout[i] = y[i] + h * (C1 * dydx[i] + C3 * k3[i] + C4 * k4[i] + C6 * k6[i]);
            self.yerr[i] =
                h * (DC1 * dydx[i] + DC3 * k3[i] + DC4 * k4[i] + DC5 * k5[i] + DC6 * k6[i]);
        }
    }
}

/// Production integrator: the host-parasite system solved with [`CashKarp`].
pub struct RungeKutta {
    dynamics: DynamicsConfig,
    solver: CashKarp,
}

impl RungeKutta {
    pub fn new(dynamics: DynamicsConfig, solver: SolverConfig) -> Self {
        Self {
            dynamics,
            solver: CashKarp::new(solver),
        }
    }
}

impl Integrator for RungeKutta {
    fn advance(
        &mut self,
        state: &mut PopulationState,
        land: &Landscape,
        active: &ActivePhenotypes,
    ) -> Result<()> {
        let rows = state.occupied_rows();
        let sys = Coevolution::new(land, &self.dynamics, &rows, &active.par);
        let mut y = sys.pack(state);
        let n_steps = self
            .solver
            .integrate(&sys, &mut y)
            .with_context(|| format!("failed to integrate {} active densities", y.len()))?;
        sys.unpack(&y, state);
        log::trace!("advanced {} densities in {n_steps} steps", y.len());
        Ok(())
    }
}
