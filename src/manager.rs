use crate::config::Config;
use crate::engine::Simulation;
use crate::observer::{Observer, SnapshotWriter, read_frames};
use crate::stats::TraitSummary;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Owns a simulation directory holding `config.toml` and one `run-XXXX` directory per run.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    pub fn create_run(&self) -> Result<()> {
        let run_idx = self
            .run_dirs()
            .context("failed to list run dirs")?
            .iter()
            .filter_map(|dir| run_index(dir))
            .max()
            .map_or(0, |idx| idx + 1);

        let run_dir = self.run_dir(run_idx);
        fs::create_dir(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut sim =
            Simulation::from_config(self.cfg.clone()).context("failed to construct simulation")?;

        let snapshot_file = run_dir.join("snapshots.msgpack");
        let writer = SnapshotWriter::create(&snapshot_file)
            .with_context(|| format!("failed to open {snapshot_file:?}"))?;
        let mut observers: Vec<Box<dyn Observer>> =
            vec![Box::new(writer), Box::new(TraitSummary::new())];

        let output = &self.cfg.output;
        sim.run(output.n_saves, output.steps_per_save, &mut observers)
            .context("failed to run simulation")?;

        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            let snapshot_file = run_dir.join("snapshots.msgpack");
            let frames = read_frames(&snapshot_file)
                .with_context(|| format!("failed to read {snapshot_file:?}"))?;
            log::info!("analyzing {} snapshots of {run_dir:?}", frames.len());

            let mut summary = TraitSummary::new();
            for frame in &frames {
                summary
                    .observe(&frame.as_snapshot())
                    .context("failed to update summary")?;
            }
            summary.finish().context("failed to report summary")?;

            if let Some(last) = frames.last() {
                log::info!("final status {:?} at step {}", last.presence, last.step);
            }
        }
        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }
        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(dirs)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }
}

/// Index encoded in a `run-XXXX` directory name.
fn run_index(run_dir: &Path) -> Option<usize> {
    run_dir
        .file_name()?
        .to_str()?
        .strip_prefix("run-")?
        .parse()
        .ok()
}
