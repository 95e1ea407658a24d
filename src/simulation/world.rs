//! Reference intersections for the simulation
//!
//! These implement the collaborator traits with a concrete geometry, a
//! crossing delay and a light that changes phase on its own. They also act
//! as referees: every rule the controllers are supposed to uphold is checked
//! here and any breach is recorded as a [`Violation`].

use anyhow::Result;
use log::{debug, warn};
use rand::Rng;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use super::intersection::{LaneService, SleepHooks, StopSignBase, TrafficLightBase};
use super::sync;
use super::types::{
    Car, CarAction, CarId, CarPosition, LaneId, LightState, Quadrant, ACTION_COUNT,
    DIRECTION_COUNT, QUADRANT_COUNT,
};

/// A broken traffic rule observed by a reference intersection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A car left its lane ahead of a car that entered before it
    LaneOrder {
        lane: LaneId,
        expected: Option<CarId>,
        actual: CarId,
    },
    /// Two cars held the same quadrant at once
    QuadrantOverlap {
        quadrant: Quadrant,
        holder: CarId,
        intruder: CarId,
    },
    /// A car entered while the light did not serve its approach
    PhaseMismatch {
        car: CarId,
        position: CarPosition,
        state: LightState,
    },
    /// A left-turner started crossing into oncoming straight traffic
    UnyieldedLeftTurn { car: CarId, oncoming: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::LaneOrder {
                lane,
                expected,
                actual,
            } => write!(
                f,
                "lane {}: car {} exited but {:?} was next",
                lane.0, actual.0, expected
            ),
            Violation::QuadrantOverlap {
                quadrant,
                holder,
                intruder,
            } => write!(
                f,
                "quadrant {}: car {} entered while held by car {}",
                quadrant.0, intruder.0, holder.0
            ),
            Violation::PhaseMismatch {
                car,
                position,
                state,
            } => write!(f, "car {} from {:?} entered on {:?}", car.0, position, state),
            Violation::UnyieldedLeftTurn { car, oncoming } => write!(
                f,
                "car {} turned left across {} oncoming cars",
                car.0, oncoming
            ),
        }
    }
}

/// Thread-safe record of violations
#[derive(Debug, Default)]
pub struct ViolationLog {
    entries: Mutex<Vec<Violation>>,
}

impl ViolationLog {
    pub fn record(&self, violation: Violation) {
        warn!("Traffic violation: {}", violation);
        sync::lock(&self.entries).push(violation);
    }

    pub fn snapshot(&self) -> Vec<Violation> {
        sync::lock(&self.entries).clone()
    }
}

/// Fail with every violation listed, if there are any
fn verify_clean(violations: Vec<Violation>) -> Result<()> {
    if violations.is_empty() {
        return Ok(());
    }

    let listed: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
    anyhow::bail!(
        "{} traffic violations: {}",
        violations.len(),
        listed.join("; ")
    )
}

/// How long a car takes to cross
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingTime {
    pub base: Duration,
    /// Upper bound of a random extra delay added to `base`
    pub jitter: Duration,
}

impl CrossingTime {
    pub fn fixed(base: Duration) -> Self {
        Self {
            base,
            jitter: Duration::ZERO,
        }
    }

    pub fn sample(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let max_micros = self.jitter.as_micros() as u64;
        self.base + Duration::from_micros(rand::rng().random_range(0..=max_micros))
    }

    fn cross(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

impl Default for CrossingTime {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(5),
            jitter: Duration::from_millis(5),
        }
    }
}

/// How cars are assigned to lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneLayout {
    /// One lane per approach
    PerApproach,
    /// One lane per approach and maneuver
    PerManeuver,
}

impl LaneLayout {
    pub fn lane_count(self) -> usize {
        match self {
            LaneLayout::PerApproach => DIRECTION_COUNT,
            LaneLayout::PerManeuver => DIRECTION_COUNT * ACTION_COUNT,
        }
    }

    pub fn lane_of(self, car: &Car) -> LaneId {
        match self {
            LaneLayout::PerApproach => LaneId(car.position.index()),
            LaneLayout::PerManeuver => {
                LaneId(car.position.index() * ACTION_COUNT + car.action.index())
            }
        }
    }
}

/// Lanes that check cars leave in the order they arrived
#[derive(Debug)]
pub struct SimLanes {
    layout: LaneLayout,
    queues: Mutex<Vec<VecDeque<CarId>>>,
    exits: Mutex<Vec<Vec<CarId>>>,
    violations: ViolationLog,
}

impl SimLanes {
    pub fn new(layout: LaneLayout) -> Self {
        let lane_count = layout.lane_count();
        Self {
            layout,
            queues: Mutex::new(vec![VecDeque::new(); lane_count]),
            exits: Mutex::new(vec![Vec::new(); lane_count]),
            violations: ViolationLog::default(),
        }
    }

    /// Cars that have left `lane`, in exit order
    pub fn exits(&self, lane: LaneId) -> Vec<CarId> {
        sync::lock(&self.exits)
            .get(lane.0)
            .cloned()
            .unwrap_or_default()
    }

    /// Total cars that have left any lane
    pub fn completed(&self) -> usize {
        sync::lock(&self.exits).iter().map(Vec::len).sum()
    }
}

impl LaneService for SimLanes {
    fn lane_count(&self) -> usize {
        self.layout.lane_count()
    }

    fn lane_of(&self, car: &Car) -> LaneId {
        self.layout.lane_of(car)
    }

    fn enter_lane(&self, car: &Car, lane: LaneId) {
        sync::lock(&self.queues)[lane.0].push_back(car.id);
    }

    fn exit_intersection(&self, car: &Car, lane: LaneId) {
        let expected = sync::lock(&self.queues)[lane.0].pop_front();
        if expected != Some(car.id) {
            self.violations.record(Violation::LaneOrder {
                lane,
                expected,
                actual: car.id,
            });
        }
        sync::lock(&self.exits)[lane.0].push(car.id);
    }
}

/// Cars currently inside the stop sign
#[derive(Debug, Default)]
struct StopSignOccupancy {
    holders: [Option<CarId>; QUADRANT_COUNT],
    inside: usize,
    peak: usize,
}

/// A four-way stop sign with quadrants numbered clockwise from north-west
///
/// Traffic drives on the right, so a car enters the quadrant matching its
/// approach index and sweeps counter-clockwise from there: one quadrant for
/// a right turn, two going straight, three for a left turn.
#[derive(Debug)]
pub struct SimStopSign {
    lanes: SimLanes,
    crossing: CrossingTime,
    occupancy: Mutex<StopSignOccupancy>,
    violations: ViolationLog,
}

impl SimStopSign {
    pub fn new(crossing: CrossingTime) -> Self {
        Self {
            lanes: SimLanes::new(LaneLayout::PerApproach),
            crossing,
            occupancy: Mutex::new(StopSignOccupancy::default()),
            violations: ViolationLog::default(),
        }
    }

    pub fn lanes(&self) -> &SimLanes {
        &self.lanes
    }

    /// Most cars that were ever crossing at the same time
    pub fn peak_concurrency(&self) -> usize {
        sync::lock(&self.occupancy).peak
    }

    pub fn violations(&self) -> Vec<Violation> {
        let mut violations = self.lanes.violations.snapshot();
        violations.extend(self.violations.snapshot());
        violations
    }

    pub fn verify(&self) -> Result<()> {
        verify_clean(self.violations())
    }
}

impl LaneService for SimStopSign {
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

impl StopSignBase for SimStopSign {
    fn quadrant_count(&self) -> usize {
        QUADRANT_COUNT
    }

    fn required_quadrants(&self, car: &Car) -> Vec<Quadrant> {
        let entry = car.position.index();
        let span = match car.action {
            CarAction::RightTurn => 1,
            CarAction::Straight => 2,
            CarAction::LeftTurn => 3,
        };

        (0..span)
            .map(|step| Quadrant((entry + QUADRANT_COUNT - step) % QUADRANT_COUNT))
            .collect()
    }

    fn go_through(&self, car: &Car) {
        let required = self.required_quadrants(car);

        {
            let mut occupancy = sync::lock(&self.occupancy);
            for quadrant in &required {
                if let Some(holder) = occupancy.holders[quadrant.0] {
                    self.violations.record(Violation::QuadrantOverlap {
                        quadrant: *quadrant,
                        holder,
                        intruder: car.id,
                    });
                }
                occupancy.holders[quadrant.0] = Some(car.id);
            }
            occupancy.inside += 1;
            occupancy.peak = occupancy.peak.max(occupancy.inside);
        }

        self.crossing.cross();

        let mut occupancy = sync::lock(&self.occupancy);
        for quadrant in &required {
            if occupancy.holders[quadrant.0] == Some(car.id) {
                occupancy.holders[quadrant.0] = None;
            }
        }
        occupancy.inside -= 1;
    }
}

/// Phase bookkeeping for [`SimTrafficLight`]
#[derive(Debug)]
struct LightModel {
    state: LightState,
    /// The green state in force before the light last turned red
    last_green: LightState,
    remaining_vertical: usize,
    remaining_horizontal: usize,
    admitted_this_phase: usize,
    inside: usize,
    straight: [usize; DIRECTION_COUNT],
    phase_changes: usize,
}

impl LightModel {
    fn remaining(&mut self, green: LightState) -> &mut usize {
        match green {
            LightState::EastWest => &mut self.remaining_horizontal,
            _ => &mut self.remaining_vertical,
        }
    }

    fn other(green: LightState) -> LightState {
        match green {
            LightState::NorthSouth => LightState::EastWest,
            _ => LightState::NorthSouth,
        }
    }

    /// Turn green for whichever axis still has traffic, preferring a switch
    fn advance(&mut self) {
        let other = Self::other(self.last_green);
        let next = if *self.remaining(other) > 0 {
            other
        } else if *self.remaining(self.last_green) > 0 {
            self.last_green
        } else {
            LightState::Red
        };

        if next != LightState::Red {
            self.last_green = next;
            self.admitted_this_phase = 0;
            self.phase_changes += 1;
        }
        self.state = next;
        debug!("Light changed to {:?}", next);
    }
}

/// A two-phase traffic light that serves a known amount of traffic
///
/// The light stays green for an axis until `phase_quota` cars have entered
/// or the axis has no cars left, turns red until the intersection drains,
/// then turns green for the other axis if it still has traffic.
#[derive(Debug)]
pub struct SimTrafficLight {
    lanes: SimLanes,
    crossing: CrossingTime,
    phase_quota: usize,
    model: Mutex<LightModel>,
    violations: ViolationLog,
}

impl SimTrafficLight {
    /// `horizontal` and `vertical` are the number of cars expected on the
    /// east-west and north-south axes
    pub fn new(
        horizontal: usize,
        vertical: usize,
        phase_quota: usize,
        crossing: CrossingTime,
    ) -> Result<Self> {
        if phase_quota == 0 {
            anyhow::bail!("Phase quota must admit at least one car");
        }

        let state = if vertical > 0 {
            LightState::NorthSouth
        } else if horizontal > 0 {
            LightState::EastWest
        } else {
            LightState::Red
        };

        Ok(Self {
            lanes: SimLanes::new(LaneLayout::PerManeuver),
            crossing,
            phase_quota,
            model: Mutex::new(LightModel {
                state,
                last_green: if state == LightState::Red {
                    LightState::NorthSouth
                } else {
                    state
                },
                remaining_vertical: vertical,
                remaining_horizontal: horizontal,
                admitted_this_phase: 0,
                inside: 0,
                straight: [0; DIRECTION_COUNT],
                phase_changes: 0,
            }),
            violations: ViolationLog::default(),
        })
    }

    pub fn lanes(&self) -> &SimLanes {
        &self.lanes
    }

    /// Number of times the light turned green after the initial phase
    pub fn phase_changes(&self) -> usize {
        sync::lock(&self.model).phase_changes
    }

    pub fn violations(&self) -> Vec<Violation> {
        let mut violations = self.lanes.violations.snapshot();
        violations.extend(self.violations.snapshot());
        violations
    }

    pub fn verify(&self) -> Result<()> {
        verify_clean(self.violations())
    }
}

impl LaneService for SimTrafficLight {
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

impl TrafficLightBase for SimTrafficLight {
    fn light_state(&self) -> LightState {
        sync::lock(&self.model).state
    }

    fn enter_traffic_light(&self, car: &Car) {
        let mut model = sync::lock(&self.model);

        if !model.state.permits(car.position) {
            self.violations.record(Violation::PhaseMismatch {
                car: car.id,
                position: car.position,
                state: model.state,
            });
        }

        model.inside += 1;
        if car.action == CarAction::Straight {
            model.straight[car.position.index()] += 1;
        }

        let green = LightState::serving(car.position);
        let remaining = model.remaining(green);
        *remaining = remaining.saturating_sub(1);
        let axis_drained = *remaining == 0;

        model.admitted_this_phase += 1;
        if model.state != LightState::Red
            && (axis_drained || model.admitted_this_phase >= self.phase_quota)
        {
            debug!("Light turning red after {} cars", model.admitted_this_phase);
            model.state = LightState::Red;
        }
    }

    fn straight_count(&self, position: CarPosition) -> usize {
        sync::lock(&self.model).straight[position.index()]
    }

    fn act(&self, car: &Car, hooks: &dyn SleepHooks) {
        if car.action == CarAction::LeftTurn {
            let oncoming = sync::lock(&self.model).straight[car.position.opposite().index()];
            if oncoming > 0 {
                self.violations.record(Violation::UnyieldedLeftTurn {
                    car: car.id,
                    oncoming,
                });
            }
        }

        hooks.before_sleep();
        self.crossing.cross();
        hooks.after_sleep();

        let mut model = sync::lock(&self.model);
        if car.action == CarAction::Straight {
            model.straight[car.position.index()] -= 1;
        }
        model.inside -= 1;
        if model.state == LightState::Red && model.inside == 0 {
            model.advance();
        }
    }
}
