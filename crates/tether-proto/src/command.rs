use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveDirection {
    Forward,
    Back,
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotateDirection {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlipDirection {
    Forward,
    Back,
    Left,
    Right,
}

/// Raw stick command: left/right, forward/back, up/down, yaw. Each axis is
/// -100..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub lr: i32,
    pub fb: i32,
    pub ud: i32,
    pub yaw: i32,
}

impl Velocity {
    pub const STOP: Velocity = Velocity { lr: 0, fb: 0, ud: 0, yaw: 0 };

    pub fn new(lr: i32, fb: i32, ud: i32, yaw: i32) -> Self {
        let c = |v: i32| v.clamp(-100, 100);
        Self { lr: c(lr), fb: c(fb), ud: c(ud), yaw: c(yaw) }
    }
}

impl MoveDirection {
    pub const ALL: [MoveDirection; 6] = [
        MoveDirection::Forward,
        MoveDirection::Back,
        MoveDirection::Left,
        MoveDirection::Right,
        MoveDirection::Up,
        MoveDirection::Down,
    ];

    /// Unit stick vector for this direction as (lr, fb, ud).
    fn axis(self) -> (i32, i32, i32) {
        match self {
            MoveDirection::Forward => (0, 1, 0),
            MoveDirection::Back => (0, -1, 0),
            MoveDirection::Left => (-1, 0, 0),
            MoveDirection::Right => (1, 0, 0),
            MoveDirection::Up => (0, 0, 1),
            MoveDirection::Down => (0, 0, -1),
        }
    }

    pub fn velocity(self, speed: i32) -> Velocity {
        let (lr, fb, ud) = self.axis();
        Velocity::new(lr * speed, fb * speed, ud * speed, 0)
    }

    pub fn name(self) -> &'static str {
        match self {
            MoveDirection::Forward => "forward",
            MoveDirection::Back => "back",
            MoveDirection::Left => "left",
            MoveDirection::Right => "right",
            MoveDirection::Up => "up",
            MoveDirection::Down => "down",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == s)
    }
}

impl RotateDirection {
    pub fn name(self) -> &'static str {
        match self {
            RotateDirection::Clockwise => "cw",
            RotateDirection::CounterClockwise => "ccw",
        }
    }
}

impl FlipDirection {
    pub fn letter(self) -> char {
        match self {
            FlipDirection::Forward => 'f',
            FlipDirection::Back => 'b',
            FlipDirection::Left => 'l',
            FlipDirection::Right => 'r',
        }
    }

    pub fn from_letter(s: &str) -> Option<Self> {
        match s {
            "f" => Some(FlipDirection::Forward),
            "b" => Some(FlipDirection::Back),
            "l" => Some(FlipDirection::Left),
            "r" => Some(FlipDirection::Right),
            _ => None,
        }
    }
}

impl fmt::Display for MoveDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for RotateDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotateDirection::Clockwise => f.write_str("clockwise"),
            RotateDirection::CounterClockwise => f.write_str("counter-clockwise"),
        }
    }
}

impl fmt::Display for FlipDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlipDirection::Forward => f.write_str("forward"),
            FlipDirection::Back => f.write_str("backward"),
            FlipDirection::Left => f.write_str("left"),
            FlipDirection::Right => f.write_str("right"),
        }
    }
}

impl fmt::Display for Velocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lr={} fb={} ud={} yaw={}", self.lr, self.fb, self.ud, self.yaw)
    }
}
