//! Stop sign controller
//!
//! A car may cross once every quadrant on its path is free. All quadrants are
//! claimed in one critical section, so two cars never hold overlapping
//! regions, and the crossing itself happens with the arbiter lock released.
//!
//! Waiters are not ordered. Any car whose quadrants become free may go first,
//! which means a car can in principle be passed over indefinitely under
//! sustained contention.

use anyhow::Result;
use log::{debug, trace};
use std::sync::{Condvar, Mutex};

use super::intersection::StopSignBase;
use super::lane_order::LaneOrdering;
use super::sync;
use super::types::{Car, Quadrant};

/// Quadrant occupancy, guarded by the arbiter lock
#[derive(Debug)]
struct QuadrantOccupancy {
    occupied: Vec<bool>,
}

impl QuadrantOccupancy {
    fn slot(&self, quadrant: Quadrant) -> bool {
        *self.occupied.get(quadrant.0).unwrap_or_else(|| {
            panic!(
                "Quadrant {} out of range ({} quadrants)",
                quadrant.0,
                self.occupied.len()
            )
        })
    }

    fn all_free(&self, quadrants: &[Quadrant]) -> bool {
        quadrants.iter().all(|&quadrant| !self.slot(quadrant))
    }

    fn mark(&mut self, quadrants: &[Quadrant], occupied: bool) {
        for quadrant in quadrants {
            self.occupied[quadrant.0] = occupied;
        }
    }
}

/// A stop sign that is safe to share between car threads
pub struct SafeStopSign<B: StopSignBase> {
    base: B,
    lanes: LaneOrdering,
    quadrants: Mutex<QuadrantOccupancy>,
    /// Signalled whenever quadrants are released
    quadrants_freed: Condvar,
}

impl<B: StopSignBase> SafeStopSign<B> {
    pub fn new(base: B) -> Result<Self> {
        let quadrant_count = base.quadrant_count();
        if quadrant_count == 0 {
            anyhow::bail!("Stop sign needs at least one quadrant");
        }

        let lanes = LaneOrdering::new(base.lane_count())?;

        Ok(Self {
            base,
            lanes,
            quadrants: Mutex::new(QuadrantOccupancy {
                occupied: vec![false; quadrant_count],
            }),
            quadrants_freed: Condvar::new(),
        })
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    /// Tear down the controller, handing back the underlying stop sign
    pub fn into_base(self) -> B {
        self.base
    }

    /// Block until every quadrant in `required` is free, then claim them all
    pub fn acquire(&self, required: &[Quadrant]) {
        let mut quadrants = sync::lock(&self.quadrants);

        while !quadrants.all_free(required) {
            trace!("Waiting for quadrants {:?}", required);
            quadrants = sync::wait(&self.quadrants_freed, quadrants);
        }

        quadrants.mark(required, true);
    }

    /// Free every quadrant in `required` and wake all waiting cars
    pub fn release(&self, required: &[Quadrant]) {
        let mut quadrants = sync::lock(&self.quadrants);
        quadrants.mark(required, false);
        sync::broadcast(&self.quadrants_freed);
    }

    /// Drive a car through the stop sign; returns once it has exited its lane
    pub fn run_car(&self, car: &Car) {
        let lane = self.base.lane_of(car);
        let required = self.base.required_quadrants(car);

        let ticket = self.lanes.enter(lane, || self.base.enter_lane(car, lane));
        debug!("Car {:?} queued in lane {} with ticket {}", car.id, lane.0, ticket.number());

        self.acquire(&required);
        debug!("Car {:?} crossing through {:?}", car.id, required);
        self.base.go_through(car);
        self.release(&required);

        self.lanes
            .exit(ticket, || self.base.exit_intersection(car, lane));
        debug!("Car {:?} exited lane {}", car.id, lane.0);
    }
}
