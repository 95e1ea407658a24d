//! Per-lane admission sequencing
//!
//! Every car entering a lane draws the next ticket from that lane's entry
//! counter. Exits are released strictly in ticket order, so cars leave a lane
//! in the order they joined it no matter how the scheduler interleaves them.
//!
//! Entry and exit are guarded by separate locks so a car queueing into a lane
//! never contends with a car leaving it.

use anyhow::Result;
use log::trace;
use std::sync::{Condvar, Mutex};

use super::sync;
use super::types::LaneId;

/// A lane admission ticket
///
/// Tickets are not `Clone`: each one is consumed by exactly one exit.
#[derive(Debug, PartialEq, Eq)]
pub struct Ticket {
    lane: LaneId,
    number: u64,
}

impl Ticket {
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    pub fn number(&self) -> u64 {
        self.number
    }
}

/// Admission state for a single lane
#[derive(Debug, Default)]
struct LaneGate {
    /// Next ticket to hand out
    next_ticket: Mutex<u64>,
    /// Ticket currently allowed to exit
    now_exiting: Mutex<u64>,
    /// Signalled whenever `now_exiting` advances
    exit_turn: Condvar,
}

/// FIFO ordering for a fixed set of lanes
#[derive(Debug)]
pub struct LaneOrdering {
    lanes: Vec<LaneGate>,
}

impl LaneOrdering {
    pub fn new(lane_count: usize) -> Result<Self> {
        if lane_count == 0 {
            anyhow::bail!("Lane ordering needs at least one lane");
        }

        Ok(Self {
            lanes: (0..lane_count).map(|_| LaneGate::default()).collect(),
        })
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    fn gate(&self, lane: LaneId) -> &LaneGate {
        self.lanes.get(lane.0).unwrap_or_else(|| {
            panic!(
                "Lane {} out of range ({} lanes)",
                lane.0,
                self.lanes.len()
            )
        })
    }

    /// Join `lane`, running `on_enter` while the entry lock is held
    ///
    /// Never blocks on a condition; a lane always admits.
    pub fn enter<F: FnOnce()>(&self, lane: LaneId, on_enter: F) -> Ticket {
        let gate = self.gate(lane);
        let mut next_ticket = sync::lock(&gate.next_ticket);

        let number = *next_ticket;
        on_enter();
        *next_ticket += 1;

        trace!("Lane {} issued ticket {}", lane.0, number);
        Ticket { lane, number }
    }

    /// Leave the lane once every earlier ticket has left
    ///
    /// `on_exit` runs while this ticket holds the lane's exit slot.
    pub fn exit<F: FnOnce()>(&self, ticket: Ticket, on_exit: F) {
        let gate = self.gate(ticket.lane);
        let now_exiting = sync::lock(&gate.now_exiting);

        let mut now_exiting = sync::wait_while(&gate.exit_turn, now_exiting, |current| {
            *current != ticket.number
        });

        on_exit();
        *now_exiting += 1;

        trace!("Lane {} released ticket {}", ticket.lane.0, ticket.number);
        sync::broadcast(&gate.exit_turn);
    }
}
