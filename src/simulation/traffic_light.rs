//! Traffic light controller
//!
//! Each car walks through these stages while holding the arbiter lock:
//!
//! 1. wait until the light serves its approach axis,
//! 2. enter the intersection,
//! 3. left turns only: wait until no car is going straight from the
//!    opposite approach,
//! 4. cross.
//!
//! The crossing delay runs with the arbiter lock released. The light's `act`
//! routine calls back into [`ArbiterHooks`] right before and right after the
//! delay, which drop and retake the lock. Both the release and the final
//! unlock broadcast, so waiters re-check after entry bookkeeping and again
//! after this car's completion.
//!
//! Phase-eligible cars are not ordered among themselves.

use anyhow::Result;
use log::{debug, error, trace};
use std::cell::RefCell;
use std::sync::{Condvar, Mutex, MutexGuard};

use super::intersection::{SleepHooks, TrafficLightBase};
use super::lane_order::LaneOrdering;
use super::sync;
use super::types::{Car, CarAction};

/// Bookkeeping guarded by the arbiter lock
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GateSnapshot {
    /// Cars admitted past the phase check that have not finished crossing
    pub inside: usize,
    /// Left-turners inside, waiting for oncoming traffic to clear
    pub yielding: usize,
}

/// Releases and retakes the arbiter lock around a crossing delay
///
/// Owns the arbiter guard between the two callbacks.
pub struct ArbiterHooks<'a> {
    gate: &'a Mutex<GateSnapshot>,
    light_changed: &'a Condvar,
    guard: RefCell<Option<MutexGuard<'a, GateSnapshot>>>,
}

impl<'a> ArbiterHooks<'a> {
    fn new(
        gate: &'a Mutex<GateSnapshot>,
        light_changed: &'a Condvar,
        guard: MutexGuard<'a, GateSnapshot>,
    ) -> Self {
        Self {
            gate,
            light_changed,
            guard: RefCell::new(Some(guard)),
        }
    }

    /// Take the guard back once `act` has returned
    fn into_guard(self) -> MutexGuard<'a, GateSnapshot> {
        match self.guard.into_inner() {
            Some(guard) => guard,
            None => {
                error!("Crossing returned without calling after_sleep; relocking");
                sync::lock(self.gate)
            }
        }
    }
}

impl SleepHooks for ArbiterHooks<'_> {
    fn before_sleep(&self) {
        match self.guard.borrow_mut().take() {
            Some(guard) => {
                sync::broadcast(self.light_changed);
                drop(guard);
            }
            None => error!("before_sleep called while the arbiter lock is not held"),
        }
    }

    fn after_sleep(&self) {
        let mut slot = self.guard.borrow_mut();
        if slot.is_some() {
            error!("after_sleep called while the arbiter lock is already held");
            return;
        }
        *slot = Some(sync::lock(self.gate));
    }
}

/// A traffic light that is safe to share between car threads
pub struct SafeTrafficLight<B: TrafficLightBase> {
    base: B,
    lanes: LaneOrdering,
    gate: Mutex<GateSnapshot>,
    /// Signalled whenever the light or the straight counts may have changed
    light_changed: Condvar,
}

impl<B: TrafficLightBase> SafeTrafficLight<B> {
    pub fn new(base: B) -> Result<Self> {
        let lanes = LaneOrdering::new(base.lane_count())?;

        Ok(Self {
            base,
            lanes,
            gate: Mutex::new(GateSnapshot::default()),
            light_changed: Condvar::new(),
        })
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    /// Tear down the controller, handing back the underlying light
    pub fn into_base(self) -> B {
        self.base
    }

    /// Current arbiter bookkeeping
    pub fn snapshot(&self) -> GateSnapshot {
        *sync::lock(&self.gate)
    }

    /// Apply an outside phase change and wake every waiting car
    ///
    /// `change` runs under the arbiter lock, so a car re-checking the light
    /// cannot miss it.
    pub fn change_light<F: FnOnce(&B)>(&self, change: F) {
        let gate = sync::lock(&self.gate);
        change(&self.base);
        sync::broadcast(&self.light_changed);
        drop(gate);
    }

    /// Drive a car through the light; returns once it has exited its lane
    pub fn run_car(&self, car: &Car) {
        let lane = self.base.lane_of(car);

        let ticket = self.lanes.enter(lane, || self.base.enter_lane(car, lane));
        debug!("Car {:?} queued in lane {} with ticket {}", car.id, lane.0, ticket.number());

        // Enter and act are separate so a left-turner can pull into the
        // intersection before checking for oncoming traffic.
        let gate = sync::lock(&self.gate);
        let mut gate = sync::wait_while(&self.light_changed, gate, |_| {
            !self.base.light_state().permits(car.position)
        });

        self.base.enter_traffic_light(car);
        gate.inside += 1;
        trace!("Car {:?} entered the light ({} inside)", car.id, gate.inside);

        if car.action == CarAction::LeftTurn {
            let oncoming = car.position.opposite();
            gate.yielding += 1;
            gate = sync::wait_while(&self.light_changed, gate, |_| {
                self.base.straight_count(oncoming) > 0
            });
            gate.yielding -= 1;
        }

        debug!("Car {:?} crossing the light", car.id);
        let hooks = ArbiterHooks::new(&self.gate, &self.light_changed, gate);
        self.base.act(car, &hooks);

        let mut gate = hooks.into_guard();
        gate.inside -= 1;
        sync::broadcast(&self.light_changed);
        drop(gate);

        self.lanes
            .exit(ticket, || self.base.exit_intersection(car, lane));
        debug!("Car {:?} exited lane {}", car.id, lane.0);
    }
}
