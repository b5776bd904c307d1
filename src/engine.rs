use crate::config::Config;
use crate::costs::CostParams;
use crate::landscape::Landscape;
use crate::mutation::{Mutation, mutate};
use crate::observer::{Observer, Snapshot};
use crate::population::{ActivePhenotypes, PopulationState, Presence};
use crate::rng::{ChaChaSource, RandomSource};
use crate::solver::{Integrator, RungeKutta};
use anyhow::{Context, Result, bail};

/// Outcome of a single simulation step.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct StepReport {
    pub presence: Presence,
    pub mutation: Option<Mutation>,
}

/// Simulation engine.
///
/// Holds the configuration, static tables, population state, random source and
/// integrator, and advances the model one step at a time:
/// presence scan, integration, extinction clamp and mutation.
pub struct Simulation<R, I> {
    cfg: Config,
    land: Landscape,
    state: PopulationState,
    active: ActivePhenotypes,
    rng: R,
    integrator: I,
    n_steps: usize,
    presence: Presence,
    halted: bool,
}

impl Simulation<ChaChaSource, RungeKutta> {
    /// Create a `Simulation` with the production random source and integrator.
    ///
    /// Seeds the random source from `cfg.init.seed` when present and from the
    /// OS otherwise.
    pub fn from_config(cfg: Config) -> Result<Self> {
        let rng = match cfg.init.seed {
            Some(seed) => ChaChaSource::from_seed(seed)?,
            None => ChaChaSource::from_os()?,
        };
        let integrator = RungeKutta::new(cfg.dynamics.clone(), cfg.solver.clone());
        Self::new(cfg, rng, integrator)
    }
}

impl<R: RandomSource, I: Integrator> Simulation<R, I> {
    /// Create a new `Simulation` with a random initial state.
    pub fn new(cfg: Config, mut rng: R, integrator: I) -> Result<Self> {
        cfg.validate().context("failed to validate config")?;

        let n_bins = cfg.model.n_bins;
        let land = Landscape::new(n_bins, &cfg.model.cost);
        let state = PopulationState::seed_from(n_bins, cfg.model.n_seeds, &cfg.init, &mut rng);

        Ok(Self {
            cfg,
            land,
            state,
            active: ActivePhenotypes::with_capacity(n_bins),
            rng,
            integrator,
            n_steps: 0,
            presence: Presence::Coexisting,
            halted: false,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.land.n_bins()
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn landscape(&self) -> &Landscape {
        &self.land
    }

    pub fn state(&self) -> &PopulationState {
        &self.state
    }

    /// Replace the trade-off parameters and rebuild the static tables.
    ///
    /// The population state is kept as it is.
    pub fn set_cost_params(&mut self, cost: CostParams) -> Result<()> {
        cost.validate().context("invalid cost parameters")?;
        self.land = Landscape::new(self.n_bins(), &cost);
        self.cfg.model.cost = cost;
        log::info!("updated cost functions");
        Ok(())
    }

    /// Wipe the population and seed it again, as at construction.
    ///
    /// The static tables and the random stream carry on; the step count, the
    /// presence status and a halt after a failed integration are cleared.
    pub fn reset(&mut self) {
        self.state = PopulationState::seed_from(
            self.n_bins(),
            self.cfg.model.n_seeds,
            &self.cfg.init,
            &mut self.rng,
        );
        self.active.host.clear();
        self.active.par.clear();
        self.n_steps = 0;
        self.presence = Presence::Coexisting;
        self.halted = false;
        log::info!("reset population");
    }

    /// Perform one simulation step.
    ///
    /// When the hosts are extinct the state stays all zero and neither
    /// integration nor mutation runs. When only the parasites are extinct the
    /// hosts keep evolving on their own.
    ///
    /// # Errors
    /// Returns an error if the integrator fails. The simulation is halted
    /// afterwards and every later call fails too.
    pub fn step(&mut self) -> Result<StepReport> {
        if self.halted {
            bail!("simulation halted after a failed integration");
        }

        let presence = self.state.scan(&mut self.active);
        self.n_steps += 1;
        if presence != self.presence {
            match presence {
                Presence::Coexisting => log::info!("hosts and parasites coexist"),
                Presence::HostsExtinct => log::info!("hosts driven extinct"),
                Presence::ParasitesExtinct => log::info!("parasites driven extinct"),
            }
            self.presence = presence;
        }

        if presence == Presence::HostsExtinct {
            return Ok(StepReport {
                presence,
                mutation: None,
            });
        }

        if let Err(error) = self
            .integrator
            .advance(&mut self.state, &self.land, &self.active)
        {
            self.halted = true;
            return Err(error).with_context(|| format!("failed to integrate step {}", self.n_steps));
        }

        self.state.clamp(self.cfg.model.epsilon);

        let mutation = mutate(&mut self.state, self.cfg.model.who, &mut self.rng);
        if let Some(event) = &mutation {
            log::debug!(
                "{:?} mutation from bin {} to bin {}",
                event.population,
                event.from,
                event.to
            );
        }

        Ok(StepReport { presence, mutation })
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            step: self.n_steps,
            presence: self.presence,
            u: &self.land.u,
            v: &self.land.v,
            x0: &self.state.x0,
            y: &self.state.y,
            a: &self.land.a,
            beta: &self.land.beta,
        }
    }

    /// Run `n_saves` blocks of `steps_per_save` steps, handing a snapshot to
    /// every observer after each block.
    pub fn run(
        &mut self,
        n_saves: usize,
        steps_per_save: usize,
        observers: &mut [Box<dyn Observer>],
    ) -> Result<()> {
        let mut n_mutations = 0;
        let mut n_extinct = 0;
        for i_save in 0..n_saves {
            for _ in 0..steps_per_save {
                let report = self.step().context("failed to perform step")?;
                if report.mutation.is_some() {
                    n_mutations += 1;
                }
                if report.presence != Presence::Coexisting {
                    n_extinct += 1;
                }
            }
            log::debug!(
                "host total {:.6}, parasite total {:.6}, joint total {:.6}",
                self.state.host_total(),
                self.state.parasite_total(),
                self.state.joint_total()
            );

            let snap = self.snapshot();
            for obs in observers.iter_mut() {
                obs.observe(&snap).context("failed to observe snapshot")?;
            }

            let progress = 100.0 * (i_save + 1) as f64 / n_saves as f64;
            log::info!("completed {progress:06.2}%");
        }

        log::info!(
            "performed {} steps with {n_mutations} mutation events and {n_extinct} extinct steps",
            n_saves * steps_per_save
        );

        for obs in observers.iter_mut() {
            obs.finish().context("failed to finish observer")?;
        }

        Ok(())
    }

    #[cfg(test)]
    fn state_mut(&mut self) -> &mut PopulationState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::mutation::Population;
    use crate::rng::Scripted;
    use std::{cell::RefCell, rc::Rc};

    /// Integrator that leaves the state untouched.
    struct Frozen;

    impl Integrator for Frozen {
        fn advance(
            &mut self,
            _state: &mut PopulationState,
            _land: &Landscape,
            _active: &ActivePhenotypes,
        ) -> Result<()> {
            Ok(())
        }
    }

    /// Integrator that counts its calls and fails from call `fail_at` on.
    struct Counting {
        calls: usize,
        fail_at: usize,
    }

    impl Integrator for Counting {
        fn advance(
            &mut self,
            _state: &mut PopulationState,
            _land: &Landscape,
            _active: &ActivePhenotypes,
        ) -> Result<()> {
            self.calls += 1;
            if self.calls >= self.fail_at {
                bail!("did not converge");
            }
            Ok(())
        }
    }

    fn small_config(n_bins: usize, who: f64) -> Config {
        let mut cfg = test_config();
        cfg.model.n_bins = n_bins;
        cfg.model.who = who;
        cfg
    }

    #[test]
    fn seeds_from_scripted_draws() {
        let rng = Scripted::new(&[], &[2; 10]);
        let sim = Simulation::new(small_config(5, 0.5), rng, Frozen).unwrap();
        let state = sim.state();
        assert_eq!(state.x0, vec![0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(state.y0[(2, 2)], 1.0);
        assert_eq!(state.y, vec![0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(sim.snapshot().y, &[0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(sim.n_steps(), 0);
    }

    #[test]
    fn rejects_invalid_config() {
        let rng = Scripted::new(&[], &[]);
        assert!(Simulation::new(small_config(1, 0.5), rng, Frozen).is_err());
        let rng = Scripted::new(&[], &[]);
        assert!(Simulation::new(small_config(5, 2.0), rng, Frozen).is_err());
    }

    #[test]
    fn host_extinction_skips_integration_and_mutation() {
        let rng = Scripted::new(&[], &[1, 3, 1, 3, 1, 3, 1, 3, 1, 3]);
        let integrator = Counting {
            calls: 0,
            fail_at: usize::MAX,
        };
        let mut sim = Simulation::new(small_config(5, 0.5), rng, integrator).unwrap();
        sim.state_mut().x0.fill(0.0);

        let report = sim.step().unwrap();
        assert_eq!(report.presence, Presence::HostsExtinct);
        assert_eq!(report.mutation, None);
        assert!(sim.state().y.iter().all(|&y| y == 0.0));
        assert!(sim.state().y0.iter().all(|&c| c == 0.0));
        assert_eq!(sim.integrator.calls, 0);
        assert_eq!(sim.snapshot().presence, Presence::HostsExtinct);

        // Stays extinct without consuming draws.
        assert_eq!(sim.step().unwrap().presence, Presence::HostsExtinct);
    }

    #[test]
    fn parasite_extinction_still_evolves_hosts() {
        let rng = Scripted::new(&[0.9, 0.1, 0.5, 0.9], &[2; 10]);
        let integrator = Counting {
            calls: 0,
            fail_at: usize::MAX,
        };
        let mut sim = Simulation::new(small_config(5, 0.5), rng, integrator).unwrap();
        sim.state_mut().y.fill(0.0);

        // Parasite draw on an empty parasite population does nothing.
        let report = sim.step().unwrap();
        assert_eq!(report.presence, Presence::ParasitesExtinct);
        assert_eq!(report.mutation, None);
        assert_eq!(sim.integrator.calls, 1);

        // Host draw moves host mass up.
        let report = sim.step().unwrap();
        assert_eq!(
            report.mutation,
            Some(Mutation {
                population: Population::Host,
                from: 2,
                to: 3
            })
        );
        assert!((sim.state().x0[3] - 0.1).abs() < 1e-15);
        assert_eq!(sim.integrator.calls, 2);
    }

    #[test]
    fn integration_failure_halts_the_run() {
        let rng = Scripted::new(&[0.1, 0.5, 0.2], &[0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
        let integrator = Counting {
            calls: 0,
            fail_at: 2,
        };
        let mut sim = Simulation::new(small_config(5, 0.5), rng, integrator).unwrap();
        sim.step().unwrap();
        let before = sim.state().clone();
        assert!(sim.step().is_err());
        assert!(sim.step().is_err());
        assert_eq!(sim.state(), &before);
        assert_eq!(sim.integrator.calls, 2);
    }

    #[test]
    fn cost_update_rebuilds_tables() {
        let rng = Scripted::new(&[], &[2; 10]);
        let mut sim = Simulation::new(small_config(5, 0.5), rng, Frozen).unwrap();
        let before = sim.state().clone();
        let old_e = sim.landscape().e.clone();

        let cost = CostParams {
            bemaxtime: 30.0,
            ..CostParams::default()
        };
        sim.set_cost_params(cost.clone()).unwrap();
        assert_eq!(sim.config().model.cost, cost);
        assert_eq!(sim.landscape().beta[0], 30.0);
        assert_ne!(sim.landscape().e, old_e);
        assert_eq!(sim.state(), &before);

        let bad = CostParams {
            vmax: cost.vmin,
            ..cost.clone()
        };
        assert!(sim.set_cost_params(bad).is_err());
        assert_eq!(sim.config().model.cost, cost);
    }

    #[test]
    fn identical_seeds_give_identical_trajectories() {
        let run = || {
            let mut sim = Simulation::from_config(small_config(12, 0.5)).unwrap();
            let mut trajectory = Vec::new();
            for _ in 0..20 {
                sim.step().unwrap();
                let state = sim.state();
                trajectory.extend(state.x0.iter().map(|x| x.to_bits()));
                trajectory.extend(state.y0.iter().map(|c| c.to_bits()));
            }
            trajectory
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn densities_stay_non_negative() {
        let mut sim = Simulation::from_config(small_config(10, 0.5)).unwrap();
        for _ in 0..30 {
            sim.step().unwrap();
            let state = sim.state();
            assert!(state.x0.iter().all(|&x| x >= 0.0));
            assert!(state.y.iter().all(|&y| y >= 0.0));
            assert!(state.y0.iter().all(|&c| c >= 0.0));
        }
    }

    #[test]
    fn run_feeds_observers() {
        #[derive(Default)]
        struct Log {
            steps: Vec<usize>,
            finished: bool,
        }

        struct Recorder(Rc<RefCell<Log>>);

        impl Observer for Recorder {
            fn observe(&mut self, snap: &Snapshot<'_>) -> Result<()> {
                self.0.borrow_mut().steps.push(snap.step);
                Ok(())
            }

            fn finish(&mut self) -> Result<()> {
                self.0.borrow_mut().finished = true;
                Ok(())
            }
        }

        let log = Rc::new(RefCell::new(Log::default()));
        let rng = Scripted::new(&[0.1, 0.5, 0.2].repeat(6), &[2; 10]);
        let mut sim = Simulation::new(small_config(5, 0.5), rng, Frozen).unwrap();
        let mut observers: Vec<Box<dyn Observer>> = vec![Box::new(Recorder(Rc::clone(&log)))];
        sim.run(3, 2, &mut observers).unwrap();

        assert_eq!(sim.n_steps(), 6);
        assert_eq!(log.borrow().steps, vec![2, 4, 6]);
        assert!(log.borrow().finished);
    }

    #[test]
    fn fixed_start_bins_skip_seed_draws() {
        let mut cfg = small_config(6, 0.5);
        cfg.init.host_start = Some(3);
        cfg.init.par_start = Some(1);
        let rng = Scripted::new(&[], &[]);
        let sim = Simulation::new(cfg, rng, Frozen).unwrap();
        assert_eq!(sim.state().x0, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(sim.state().y0[(3, 1)], 1.0);
        assert_eq!(sim.state().joint_total(), 1.0);
    }

    #[test]
    fn reset_reseeds_and_clears_halt() {
        let mut cfg = small_config(5, 0.5);
        cfg.model.n_seeds = 1;
        let rng = Scripted::new(&[0.9, 0.5, 0.5], &[2, 2, 4, 0]);
        let integrator = Counting {
            calls: 0,
            fail_at: 1,
        };
        let mut sim = Simulation::new(cfg, rng, integrator).unwrap();
        assert!(sim.step().is_err());
        assert!(sim.step().is_err());
        assert_eq!(sim.n_steps(), 1);

        sim.integrator.fail_at = usize::MAX;
        sim.reset();
        assert_eq!(sim.n_steps(), 0);
        assert_eq!(sim.state().x0, vec![0.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(sim.state().y0[(4, 0)], 1.0);
        assert_eq!(sim.state().y, vec![1.0, 0.0, 0.0, 0.0, 0.0]);

        let report = sim.step().unwrap();
        assert_eq!(report.presence, Presence::Coexisting);
        assert_eq!(sim.n_steps(), 1);
        assert_eq!(sim.rng.remaining(), (0, 0));
    }
}
