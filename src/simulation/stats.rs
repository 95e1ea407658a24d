//! Statistics collected from a simulation run

use log::info;
use ordered_float::OrderedFloat;
use std::time::Duration;

use super::config::IntersectionKind;
use super::types::{Car, DIRECTION_COUNT};

/// Outcome of a headless run
#[derive(Debug, Clone)]
pub struct SimulationStats {
    pub intersection: IntersectionKind,
    pub cars_spawned: usize,
    pub cars_completed: usize,
    pub elapsed: Duration,
    /// Cars per approach, indexed by `CarPosition::index`
    pub per_approach: [usize; DIRECTION_COUNT],
    /// Most cars crossing a stop sign at once
    pub peak_concurrency: Option<usize>,
    /// Green phases a light went through after the first
    pub phase_changes: Option<usize>,
    /// Per-car time from arrival to lane exit in milliseconds, sorted
    latencies_ms: Vec<OrderedFloat<f64>>,
    pub violations: usize,
}

impl SimulationStats {
    pub fn new(
        intersection: IntersectionKind,
        cars: &[Car],
        latencies: &[Duration],
        elapsed: Duration,
    ) -> Self {
        let mut per_approach = [0; DIRECTION_COUNT];
        for car in cars {
            per_approach[car.position.index()] += 1;
        }

        let mut latencies_ms: Vec<OrderedFloat<f64>> = latencies
            .iter()
            .map(|latency| OrderedFloat(latency.as_secs_f64() * 1000.0))
            .collect();
        latencies_ms.sort();

        Self {
            intersection,
            cars_spawned: cars.len(),
            cars_completed: 0,
            elapsed,
            per_approach,
            peak_concurrency: None,
            phase_changes: None,
            latencies_ms,
            violations: 0,
        }
    }

    /// Latency at percentile `p` (0-100) in milliseconds, nearest rank
    pub fn latency_percentile(&self, p: f64) -> Option<f64> {
        if self.latencies_ms.is_empty() {
            return None;
        }
        let rank = ((p.clamp(0.0, 100.0) / 100.0) * self.latencies_ms.len() as f64).ceil() as usize;
        let index = rank.saturating_sub(1).min(self.latencies_ms.len() - 1);
        Some(self.latencies_ms[index].into_inner())
    }

    pub fn max_latency(&self) -> Option<f64> {
        self.latencies_ms.last().map(|latency| latency.into_inner())
    }

    pub fn success_rate(&self) -> f32 {
        if self.cars_spawned > 0 {
            (self.cars_completed as f32 / self.cars_spawned as f32) * 100.0
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        info!("=== SIMULATION COMPLETE ===");
        info!("Intersection: {:?}", self.intersection);
        info!("Elapsed time: {:.2}s", self.elapsed.as_secs_f64());
        info!("Total cars spawned: {}", self.cars_spawned);
        info!("Total cars completed: {}", self.cars_completed);
        info!(
            "Cars per approach (N/E/S/W): {}/{}/{}/{}",
            self.per_approach[0], self.per_approach[1], self.per_approach[2], self.per_approach[3]
        );
        if let Some(peak) = self.peak_concurrency {
            info!("Peak concurrent crossings: {}", peak);
        }
        if let Some(changes) = self.phase_changes {
            info!("Phase changes: {}", changes);
        }
        if let (Some(median), Some(p95), Some(max)) = (
            self.latency_percentile(50.0),
            self.latency_percentile(95.0),
            self.max_latency(),
        ) {
            info!(
                "Latency ms (p50/p95/max): {:.1}/{:.1}/{:.1}",
                median, p95, max
            );
        }
        info!("Violations: {}", self.violations);
        info!("Success rate: {:.1}%", self.success_rate());
    }
}
