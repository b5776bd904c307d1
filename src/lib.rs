//! Host-parasite coevolution along discretized trait axes.
//!
//! Hosts and parasites each occupy a fixed number of phenotype bins on a
//! continuous trait axis. Every [`engine::Simulation::step`] scans which bins
//! are populated, integrates the population dynamics over one time window,
//! clamps extinct densities and moves a fraction of one bin into a neighbour.

pub mod config;
pub mod costs;
pub mod dynamics;
pub mod engine;
pub mod interaction;
pub mod landscape;
pub mod manager;
pub mod mutation;
pub mod observer;
pub mod population;
pub mod rng;
pub mod solver;
pub mod stats;
pub mod trait_space;
