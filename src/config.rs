use crate::costs::CostParams;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Trait space, trade-offs, mutation and extinction parameters.
    #[serde(default)]
    pub model: ModelConfig,
    /// Ecological rates used by the population dynamics.
    #[serde(default)]
    pub dynamics: DynamicsConfig,
    /// Integrator settings.
    #[serde(default)]
    pub solver: SolverConfig,
    /// Initial condition settings.
    #[serde(default)]
    pub init: InitConfig,
    /// Output settings.
    pub output: OutputConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Number of phenotype bins per trait axis.
    pub n_bins: usize,
    /// Probability that a mutation event hits the host population.
    pub who: f64,
    /// Extinction tolerance.
    pub epsilon: f64,
    /// Number of (host, parasite) pairs drawn for the initial state.
    pub n_seeds: usize,
    /// Trait ranges and trade-off shapes.
    pub cost: CostParams,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_bins: 30,
            who: 0.5,
            epsilon: 0.0,
            n_seeds: 5,
            cost: CostParams::default(),
        }
    }
}

/// Form of the coupled host-parasite equations.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicsKind {
    /// Susceptible hosts `x0` and infected hosts `y0` with crowding, death,
    /// virulence and recovery.
    #[default]
    Epidemic,
    /// Bare per-capita coupling through the interaction matrix and the costs.
    Coupled,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DynamicsConfig {
    pub kind: DynamicsKind,
    /// Crowding (density dependence) coefficient.
    pub q: f64,
    /// Natural death rate.
    pub b: f64,
    /// Virulence.
    pub alpha: f64,
    /// Recovery rate.
    pub gamma: f64,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            kind: DynamicsKind::Epidemic,
            q: 0.5,
            b: 0.5,
            alpha: 1.0,
            gamma: 1.0,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Length of the time window integrated by every simulation step.
    pub t_window: f64,
    /// Relative error target of a single adaptive step.
    pub tol: f64,
    /// First trial step size.
    pub h_init: f64,
    /// Smallest step size accepted before giving up.
    pub h_min: f64,
    /// Maximum number of internal steps per time window.
    pub max_steps: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            t_window: 10.0,
            tol: 1e-6,
            h_init: 0.1,
            h_min: 1e-12,
            max_steps: 100_000,
        }
    }
}

#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InitConfig {
    /// Random seed; drawn from the OS when absent.
    pub seed: Option<u64>,
    /// Host bin of every initial pair; drawn at random when absent.
    pub host_start: Option<usize>,
    /// Parasite bin of every initial pair; drawn at random when absent.
    pub par_start: Option<usize>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Number of snapshots written per run.
    pub n_saves: usize,
    /// Number of simulation steps between snapshots.
    pub steps_per_save: usize,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let model = &self.model;
        check_num(model.n_bins, 2..=1000).context("invalid number of bins")?;
        check_num(model.who, 0.0..=1.0).context("invalid mutation split weight")?;
        check_num(model.epsilon, 0.0..f64::INFINITY).context("invalid extinction tolerance")?;
        check_num(model.n_seeds, 1..=1000).context("invalid number of seeds")?;
        model.cost.validate().context("invalid cost parameters")?;

        let init = &self.init;
        if let Some(bin) = init.host_start {
            check_num(bin, 0..model.n_bins).context("invalid host start bin")?;
        }
        if let Some(bin) = init.par_start {
            check_num(bin, 0..model.n_bins).context("invalid parasite start bin")?;
        }

        let dynamics = &self.dynamics;
        check_num(dynamics.q, 0.0..1e6).context("invalid crowding coefficient")?;
        check_num(dynamics.b, 0.0..1e6).context("invalid death rate")?;
        check_num(dynamics.alpha, 0.0..1e6).context("invalid virulence")?;
        check_num(dynamics.gamma, 0.0..1e6).context("invalid recovery rate")?;

        let solver = &self.solver;
        check_pos(solver.t_window).context("invalid time window")?;
        check_pos(solver.tol).context("invalid tolerance")?;
        check_pos(solver.h_init).context("invalid initial step size")?;
        check_num(solver.h_min, 0.0..solver.h_init).context("invalid minimum step size")?;
        check_num(solver.max_steps, 1..=100_000_000).context("invalid step budget")?;

        let output = &self.output;
        check_num(output.n_saves, 1..=1_000_000).context("invalid number of saves")?;
        check_num(output.steps_per_save, 1..=1_000_000)
            .context("invalid number of steps per save")?;

        Ok(())
    }
}

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

pub fn check_pos(num: f64) -> Result<()> {
    if !(num.is_finite() && num > 0.0) {
        bail!("number must be finite and positive, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        model: ModelConfig::default(),
        dynamics: DynamicsConfig::default(),
        solver: SolverConfig::default(),
        init: InitConfig {
            seed: Some(7),
            ..InitConfig::default()
        },
        output: OutputConfig {
            n_saves: 4,
            steps_per_save: 2,
        },
    }
}
