//! Core types shared by the intersection controllers
//!
//! These describe vehicles and intersection geometry identifiers. The
//! controllers only reference them; ownership stays with the caller.

/// Number of approach directions at an intersection
pub const DIRECTION_COUNT: usize = 4;

/// Number of quadrants a four-way stop sign is split into
pub const QUADRANT_COUNT: usize = 4;

/// Number of maneuvers a car can make
pub const ACTION_COUNT: usize = 3;

/// Traffic lights keep one lane per approach and maneuver
pub const TRAFFIC_LIGHT_LANE_COUNT: usize = DIRECTION_COUNT * ACTION_COUNT;

/// A wrapper type for car IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarId(pub usize);

/// A lane handle; doubles as the stable lane index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaneId(pub usize);

/// A stop-sign region identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quadrant(pub usize);

/// The approach a car arrives from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CarPosition {
    North,
    East,
    South,
    West,
}

impl CarPosition {
    pub const ALL: [CarPosition; DIRECTION_COUNT] = [
        CarPosition::North,
        CarPosition::East,
        CarPosition::South,
        CarPosition::West,
    ];

    pub fn index(self) -> usize {
        match self {
            CarPosition::North => 0,
            CarPosition::East => 1,
            CarPosition::South => 2,
            CarPosition::West => 3,
        }
    }

    pub fn opposite(self) -> CarPosition {
        match self {
            CarPosition::North => CarPosition::South,
            CarPosition::East => CarPosition::West,
            CarPosition::South => CarPosition::North,
            CarPosition::West => CarPosition::East,
        }
    }

    /// Whether this approach belongs to the north-south axis
    pub fn is_vertical(self) -> bool {
        matches!(self, CarPosition::North | CarPosition::South)
    }
}

/// The maneuver a car performs inside the intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CarAction {
    Straight,
    RightTurn,
    LeftTurn,
}

impl CarAction {
    pub const ALL: [CarAction; ACTION_COUNT] =
        [CarAction::Straight, CarAction::RightTurn, CarAction::LeftTurn];

    pub fn index(self) -> usize {
        match self {
            CarAction::Straight => 0,
            CarAction::RightTurn => 1,
            CarAction::LeftTurn => 2,
        }
    }
}

/// A vehicle passing through an intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Car {
    pub id: CarId,
    pub position: CarPosition,
    pub action: CarAction,
}

impl Car {
    pub fn new(id: usize, position: CarPosition, action: CarAction) -> Self {
        Self {
            id: CarId(id),
            position,
            action,
        }
    }
}

/// State reported by a traffic light
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightState {
    /// North and south approaches have right-of-way
    NorthSouth,
    /// East and west approaches have right-of-way
    EastWest,
    /// Nobody may enter
    Red,
}

impl LightState {
    /// Whether a car approaching from `position` may enter
    pub fn permits(self, position: CarPosition) -> bool {
        match self {
            LightState::NorthSouth => position.is_vertical(),
            LightState::EastWest => !position.is_vertical(),
            LightState::Red => false,
        }
    }

    /// The green state that serves `position`
    pub fn serving(position: CarPosition) -> LightState {
        if position.is_vertical() {
            LightState::NorthSouth
        } else {
            LightState::EastWest
        }
    }
}
