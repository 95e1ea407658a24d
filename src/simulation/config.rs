//! Simulation run configuration

use anyhow::Result;
use clap::ValueEnum;
use std::time::Duration;

use super::world::CrossingTime;

/// Which intersection a run drives cars through
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IntersectionKind {
    StopSign,
    TrafficLight,
}

/// Parameters for a headless run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    pub intersection: IntersectionKind,
    /// Number of car threads to spawn
    pub cars: usize,
    /// Seed for reproducible car generation; random when `None`
    pub seed: Option<u64>,
    /// Base time a crossing takes, in milliseconds
    pub crossing_ms: u64,
    /// Maximum random extra crossing time, in milliseconds
    pub jitter_ms: u64,
    /// Cars arrive at a random offset within this window, in milliseconds
    pub arrival_spread_ms: u64,
    /// Cars a light admits per green phase
    pub phase_quota: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            intersection: IntersectionKind::StopSign,
            cars: 40,
            seed: None,
            crossing_ms: 5,
            jitter_ms: 5,
            arrival_spread_ms: 50,
            phase_quota: 4,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cars == 0 {
            anyhow::bail!("At least one car is required");
        }
        if self.phase_quota == 0 {
            anyhow::bail!("Phase quota must be at least 1");
        }
        Ok(())
    }

    pub fn crossing_time(&self) -> CrossingTime {
        CrossingTime {
            base: Duration::from_millis(self.crossing_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}
