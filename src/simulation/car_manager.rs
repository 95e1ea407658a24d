//! Car generation and car threads for headless runs
//!
//! Every car gets its own OS thread. Threads are scoped so the intersection
//! can be borrowed by all of them and inspected once they have joined.

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;
use std::time::{Duration, Instant};

use super::config::{IntersectionKind, SimConfig};
use super::stats::SimulationStats;
use super::stop_sign::SafeStopSign;
use super::traffic_light::SafeTrafficLight;
use super::types::{Car, CarAction, CarPosition};
use super::world::{SimStopSign, SimTrafficLight};

/// A car and how long after the start of the run it shows up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    pub car: Car,
    pub delay: Duration,
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Random cars with random arrival offsets
pub fn generate_arrivals(config: &SimConfig) -> Vec<Arrival> {
    let mut rng = make_rng(config.seed);

    (0..config.cars)
        .map(|id| {
            let position = CarPosition::ALL[rng.random_range(0..CarPosition::ALL.len())];
            let action = CarAction::ALL[rng.random_range(0..CarAction::ALL.len())];
            let delay = Duration::from_millis(rng.random_range(0..=config.arrival_spread_ms));
            Arrival {
                car: Car::new(id, position, action),
                delay,
            }
        })
        .collect()
}

/// Run every arrival on its own thread and collect per-car latencies
///
/// Latency runs from the car's arrival to its lane exit.
pub fn drive_cars<F>(arrivals: &[Arrival], run_car: F) -> Result<Vec<Duration>>
where
    F: Fn(&Car) + Sync,
{
    let run_car = &run_car;

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(arrivals.len());
        for arrival in arrivals {
            let handle = thread::Builder::new()
                .name(format!("car-{}", arrival.car.id.0))
                .spawn_scoped(scope, move || {
                    thread::sleep(arrival.delay);
                    let arrived = Instant::now();
                    run_car(&arrival.car);
                    arrived.elapsed()
                })
                .context("Failed to spawn car thread")?;
            handles.push(handle);
        }

        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| anyhow!("Car thread panicked")))
            .collect()
    })
}

/// Run cars through a stop sign
pub fn run_stop_sign(config: &SimConfig) -> Result<SimulationStats> {
    config.validate()?;
    let arrivals = generate_arrivals(config);
    info!("SPAWNING CARS: {} cars at a stop sign", arrivals.len());

    let sign = SafeStopSign::new(SimStopSign::new(config.crossing_time()))?;

    let started = Instant::now();
    let latencies = drive_cars(&arrivals, |car| sign.run_car(car))?;
    let elapsed = started.elapsed();

    let base = sign.into_base();
    let cars: Vec<Car> = arrivals.iter().map(|arrival| arrival.car).collect();
    let mut stats =
        SimulationStats::new(IntersectionKind::StopSign, &cars, &latencies, elapsed);
    stats.cars_completed = base.lanes().completed();
    stats.peak_concurrency = Some(base.peak_concurrency());
    stats.violations = base.violations().len();
    debug!("Stop sign run finished in {:?}", elapsed);

    Ok(stats)
}

/// Run cars through a traffic light
pub fn run_traffic_light(config: &SimConfig) -> Result<SimulationStats> {
    config.validate()?;
    let arrivals = generate_arrivals(config);
    info!("SPAWNING CARS: {} cars at a traffic light", arrivals.len());

    let vertical = arrivals
        .iter()
        .filter(|arrival| arrival.car.position.is_vertical())
        .count();
    let horizontal = arrivals.len() - vertical;

    let light = SafeTrafficLight::new(SimTrafficLight::new(
        horizontal,
        vertical,
        config.phase_quota,
        config.crossing_time(),
    )?)?;

    let started = Instant::now();
    let latencies = drive_cars(&arrivals, |car| light.run_car(car))?;
    let elapsed = started.elapsed();

    let base = light.into_base();
    let cars: Vec<Car> = arrivals.iter().map(|arrival| arrival.car).collect();
    let mut stats =
        SimulationStats::new(IntersectionKind::TrafficLight, &cars, &latencies, elapsed);
    stats.cars_completed = base.lanes().completed();
    stats.phase_changes = Some(base.phase_changes());
    stats.violations = base.violations().len();
    debug!("Traffic light run finished in {:?}", elapsed);

    Ok(stats)
}

/// Run whichever intersection the config names
pub fn run(config: &SimConfig) -> Result<SimulationStats> {
    match config.intersection {
        IntersectionKind::StopSign => run_stop_sign(config),
        IntersectionKind::TrafficLight => run_traffic_light(config),
    }
}
