//! Intersection controllers and the headless simulation around them
//!
//! The controllers ([`SafeStopSign`], [`SafeTrafficLight`]) coordinate any
//! number of car threads through one intersection. Everything they need
//! from the outside world goes through the traits in [`intersection`]; the
//! reference implementations in [`world`] plug into those traits for
//! headless runs and tests.

mod car_manager;
mod config;
pub mod intersection;
mod lane_order;
mod stats;
mod stop_sign;
pub mod sync;
mod traffic_light;
mod types;
pub mod world;

pub use car_manager::{drive_cars, generate_arrivals, run, run_stop_sign, run_traffic_light, Arrival};
pub use config::{IntersectionKind, SimConfig};
pub use intersection::{LaneService, SleepHooks, StopSignBase, TrafficLightBase};
pub use lane_order::{LaneOrdering, Ticket};
pub use stats::SimulationStats;
pub use stop_sign::SafeStopSign;
pub use traffic_light::{ArbiterHooks, GateSnapshot, SafeTrafficLight};
pub use types::{
    Car, CarAction, CarId, CarPosition, LaneId, LightState, Quadrant, ACTION_COUNT,
    DIRECTION_COUNT, QUADRANT_COUNT, TRAFFIC_LIGHT_LANE_COUNT,
};
pub use world::{CrossingTime, LaneLayout, SimLanes, SimStopSign, SimTrafficLight, Violation};
