//! Safe Intersection Library
//!
//! Deadlock-free coordination of concurrently running car threads through a
//! four-way stop sign or a two-phase traffic light.

pub mod simulation;
