//! Stop sign controller tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::Duration;

use safe_intersection::simulation::{
    run_stop_sign, Car, CarAction, CarPosition, CrossingTime, IntersectionKind, LaneId,
    LaneService, Quadrant, SafeStopSign, SimConfig, SimStopSign, StopSignBase,
};

/// Uses the reference geometry, but every crossing waits until `expected`
/// cars are inside the intersection at the same time.
struct RendezvousStopSign {
    geometry: SimStopSign,
    expected: usize,
    inside: Mutex<usize>,
    arrived: Condvar,
    met: AtomicUsize,
}

impl RendezvousStopSign {
    fn new(expected: usize) -> Self {
        Self {
            geometry: SimStopSign::new(CrossingTime::fixed(Duration::ZERO)),
            expected,
            inside: Mutex::new(0),
            arrived: Condvar::new(),
            met: AtomicUsize::new(0),
        }
    }
}

impl LaneService for RendezvousStopSign {
    fn lane_count(&self) -> usize {
        self.geometry.lane_count()
    }

    fn lane_of(&self, car: &Car) -> LaneId {
        self.geometry.lane_of(car)
    }

    fn enter_lane(&self, car: &Car, lane: LaneId) {
        self.geometry.enter_lane(car, lane);
    }

    fn exit_intersection(&self, car: &Car, lane: LaneId) {
        self.geometry.exit_intersection(car, lane);
    }
}

impl StopSignBase for RendezvousStopSign {
    fn quadrant_count(&self) -> usize {
        self.geometry.quadrant_count()
    }

    fn required_quadrants(&self, car: &Car) -> Vec<Quadrant> {
        self.geometry.required_quadrants(car)
    }

    fn go_through(&self, _car: &Car) {
        let mut inside = self.inside.lock().unwrap();
        *inside += 1;
        self.arrived.notify_all();

        let (_inside, result) = self
            .arrived
            .wait_timeout_while(inside, Duration::from_secs(5), |inside| {
                *inside < self.expected
            })
            .unwrap();
        if !result.timed_out() {
            self.met.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Always names a quadrant the stop sign does not have
struct BrokenGeometry {
    lanes: SimStopSign,
}

impl LaneService for BrokenGeometry {
    fn lane_count(&self) -> usize {
        self.lanes.lane_count()
    }

    fn lane_of(&self, car: &Car) -> LaneId {
        self.lanes.lane_of(car)
    }

    fn enter_lane(&self, car: &Car, lane: LaneId) {
        self.lanes.enter_lane(car, lane);
    }

    fn exit_intersection(&self, car: &Car, lane: LaneId) {
        self.lanes.exit_intersection(car, lane);
    }
}

impl StopSignBase for BrokenGeometry {
    fn quadrant_count(&self) -> usize {
        4
    }

    fn required_quadrants(&self, _car: &Car) -> Vec<Quadrant> {
        vec![Quadrant(9)]
    }

    fn go_through(&self, _car: &Car) {}
}

fn run_together(sign: &SafeStopSign<impl StopSignBase>, cars: &[Car]) {
    thread::scope(|scope| {
        for car in cars {
            scope.spawn(move || sign.run_car(car));
        }
    });
}

#[test]
fn test_reference_geometry() {
    let sign = SimStopSign::new(CrossingTime::default());
    let quadrants = |position, action| sign.required_quadrants(&Car::new(0, position, action));

    assert_eq!(
        quadrants(CarPosition::North, CarAction::RightTurn),
        vec![Quadrant(0)]
    );
    assert_eq!(
        quadrants(CarPosition::North, CarAction::Straight),
        vec![Quadrant(0), Quadrant(3)]
    );
    assert_eq!(
        quadrants(CarPosition::North, CarAction::LeftTurn),
        vec![Quadrant(0), Quadrant(3), Quadrant(2)]
    );
    assert_eq!(
        quadrants(CarPosition::South, CarAction::Straight),
        vec![Quadrant(2), Quadrant(1)]
    );
    assert_eq!(
        quadrants(CarPosition::East, CarAction::Straight),
        vec![Quadrant(1), Quadrant(0)]
    );
}

#[test]
fn test_four_right_turns_cross_concurrently() {
    let sign = SafeStopSign::new(RendezvousStopSign::new(4)).expect("stop sign");
    let cars: Vec<Car> = CarPosition::ALL
        .iter()
        .enumerate()
        .map(|(id, &position)| Car::new(id, position, CarAction::RightTurn))
        .collect();

    run_together(&sign, &cars);

    let base = sign.into_base();
    assert_eq!(base.met.load(Ordering::SeqCst), 4);
    base.geometry.verify().expect("no violations");
}

#[test]
fn test_opposing_straights_cross_concurrently() {
    let sign = SafeStopSign::new(RendezvousStopSign::new(2)).expect("stop sign");
    let cars = [
        Car::new(0, CarPosition::North, CarAction::Straight),
        Car::new(1, CarPosition::South, CarAction::Straight),
    ];

    run_together(&sign, &cars);

    assert_eq!(sign.base().met.load(Ordering::SeqCst), 2);
}

#[test]
fn test_overlapping_paths_take_turns() {
    let sign = SafeStopSign::new(SimStopSign::new(CrossingTime::fixed(
        Duration::from_millis(30),
    )))
    .expect("stop sign");
    let cars = [
        Car::new(0, CarPosition::North, CarAction::LeftTurn),
        Car::new(1, CarPosition::East, CarAction::Straight),
        Car::new(2, CarPosition::South, CarAction::LeftTurn),
    ];

    run_together(&sign, &cars);

    let base = sign.into_base();
    assert_eq!(base.peak_concurrency(), 1);
    assert_eq!(base.lanes().completed(), 3);
    base.verify().expect("no violations");
}

#[test]
fn test_heavy_traffic_keeps_quadrants_exclusive() {
    let sign = SafeStopSign::new(SimStopSign::new(CrossingTime {
        base: Duration::from_millis(1),
        jitter: Duration::from_millis(2),
    }))
    .expect("stop sign");

    let cars: Vec<Car> = (0..64)
        .map(|id| {
            let position = CarPosition::ALL[id % 4];
            let action = CarAction::ALL[(id / 4) % 3];
            Car::new(id, position, action)
        })
        .collect();

    run_together(&sign, &cars);

    let base = sign.into_base();
    assert_eq!(base.lanes().completed(), cars.len());
    base.verify().expect("no violations");

    // Cars were queued per approach; each lane drained in arrival order.
    for position in CarPosition::ALL {
        let exits = base.lanes().exits(LaneId(position.index()));
        assert_eq!(exits.len(), 16);
    }
}

#[test]
fn test_seeded_run_completes_without_violations() {
    let config = SimConfig {
        intersection: IntersectionKind::StopSign,
        cars: 60,
        seed: Some(7),
        crossing_ms: 1,
        jitter_ms: 2,
        arrival_spread_ms: 20,
        phase_quota: 4,
    };

    let stats = run_stop_sign(&config).expect("run should succeed");

    assert_eq!(stats.cars_spawned, 60);
    assert_eq!(stats.cars_completed, 60);
    assert_eq!(stats.violations, 0);
    assert!(stats.peak_concurrency.unwrap_or(0) >= 1);
    assert_eq!(stats.per_approach.iter().sum::<usize>(), 60);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_unknown_quadrant_is_a_contract_violation() {
    let sign = SafeStopSign::new(BrokenGeometry {
        lanes: SimStopSign::new(CrossingTime::default()),
    })
    .expect("stop sign");

    sign.run_car(&Car::new(0, CarPosition::West, CarAction::Straight));
}
