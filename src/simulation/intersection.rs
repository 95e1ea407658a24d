//! Services an intersection controller consumes
//!
//! Geometry, lane bookkeeping, light phases and the physical crossing all
//! live behind these traits. Implementations are shared by reference across
//! every vehicle thread, so they must be `Send + Sync` and do their own
//! internal bookkeeping safely.

use super::types::{Car, CarPosition, LaneId, LightState, Quadrant};

/// Lane assignment and lane movement
pub trait LaneService: Send + Sync {
    /// Number of entry lanes; lane ids are `0..lane_count()`
    fn lane_count(&self) -> usize;

    /// The lane a car queues in
    fn lane_of(&self, car: &Car) -> LaneId;

    /// Move a car into its lane
    fn enter_lane(&self, car: &Car, lane: LaneId);

    /// Move a car out of the intersection through its lane
    fn exit_intersection(&self, car: &Car, lane: LaneId);
}

/// A four-way stop sign split into quadrants
pub trait StopSignBase: LaneService {
    fn quadrant_count(&self) -> usize;

    /// Every quadrant the car passes through
    fn required_quadrants(&self, car: &Car) -> Vec<Quadrant>;

    /// Physically cross the intersection; may block for the crossing time
    fn go_through(&self, car: &Car);
}

/// Callbacks invoked around the blocking part of a traffic light crossing
///
/// The implementor is the context handle for both calls.
pub trait SleepHooks {
    /// Called right before the crossing delay starts
    fn before_sleep(&self);

    /// Called right after the crossing delay ends
    fn after_sleep(&self);
}

/// A two-phase traffic light
pub trait TrafficLightBase: LaneService {
    fn light_state(&self) -> LightState;

    /// Record that a car now occupies the intersection
    fn enter_traffic_light(&self, car: &Car);

    /// Cars currently travelling straight through from `position`
    fn straight_count(&self, position: CarPosition) -> usize;

    /// Cross the intersection, calling `hooks` around the crossing delay
    fn act(&self, car: &Car, hooks: &dyn SleepHooks);
}
