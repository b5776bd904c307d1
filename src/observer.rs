use crate::population::Presence;
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, ErrorKind, Write},
    path::Path,
};

/// Read-only view of the simulation handed to observers after a step.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    /// Number of steps performed so far.
    pub step: usize,
    /// Status found by the last presence scan.
    pub presence: Presence,
    pub u: &'a [f64],
    pub v: &'a [f64],
    pub x0: &'a [f64],
    pub y: &'a [f64],
    pub a: &'a [f64],
    pub beta: &'a [f64],
}

/// Owned counterpart of [`Snapshot`], as read back from a snapshot file.
#[derive(Debug, PartialEq, Deserialize)]
pub struct Frame {
    pub step: usize,
    pub presence: Presence,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub x0: Vec<f64>,
    pub y: Vec<f64>,
    pub a: Vec<f64>,
    pub beta: Vec<f64>,
}

impl Frame {
    pub fn as_snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            step: self.step,
            presence: self.presence,
            u: &self.u,
            v: &self.v,
            x0: &self.x0,
            y: &self.y,
            a: &self.a,
            beta: &self.beta,
        }
    }
}

/// Consumer of simulation snapshots, such as a plotter.
///
/// Observers only read; they never influence the simulation.
pub trait Observer {
    fn observe(&mut self, snap: &Snapshot<'_>) -> Result<()>;

    /// Called once after the last snapshot of a run.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes every snapshot as a MessagePack frame.
pub struct SnapshotWriter {
    writer: BufWriter<File>,
    n_frames: usize,
}

impl SnapshotWriter {
    pub fn create<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        Ok(Self {
            writer: BufWriter::new(file),
            n_frames: 0,
        })
    }
}

impl Observer for SnapshotWriter {
    fn observe(&mut self, snap: &Snapshot<'_>) -> Result<()> {
        encode::write(&mut self.writer, snap).context("failed to serialize snapshot")?;
        self.n_frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .context("failed to flush writer stream")?;
        log::info!("wrote {} snapshots", self.n_frames);
        Ok(())
    }
}

/// Read every frame of a snapshot file.
pub fn read_frames<P: AsRef<Path>>(file: P) -> Result<Vec<Frame>> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);

    let mut frames = Vec::new();
    loop {
        match decode::from_read(&mut reader) {
            Ok(frame) => frames.push(frame),
            Err(decode::Error::InvalidMarkerRead(err)) if err.kind() == ErrorKind::UnexpectedEof => {
                break;
            }
            Err(err) => return Err(err).context("failed to deserialize frame"),
        }
    }
    Ok(frames)
}
