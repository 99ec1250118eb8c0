use std::time::Duration;
use tether_proto::command::{FlipDirection, MoveDirection, RotateDirection};
use tracing::warn;

pub const MIN_DISTANCE_CM: i64 = 20;
pub const MAX_DISTANCE_CM: i64 = 500;
pub const DEFAULT_DISTANCE_CM: i64 = 50;

pub const MIN_ROTATION_DEG: i64 = 1;
pub const MAX_ROTATION_DEG: i64 = 360;
pub const DEFAULT_ROTATION_DEG: i64 = 90;

pub const MIN_RC_SPEED: i64 = 10;
pub const MAX_RC_SPEED: i64 = 100;
pub const DEFAULT_RC_SPEED: i64 = 50;

pub const MIN_RC_SECS: f32 = 0.1;
pub const MAX_RC_SECS: f32 = 5.0;
pub const DEFAULT_RC_SECS: f32 = 1.0;

/// What the operator asked for. Numeric arguments are carried as given and
/// clamped by the executor right before dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Takeoff,
    Land,
    Emergency,
    Reconnect,
    Move { direction: MoveDirection, distance_cm: i64 },
    Rotate { direction: RotateDirection, degrees: i64 },
    Flip(FlipDirection),
    Rc { direction: MoveDirection, speed: i64, secs: f32 },
    Status,
    Battery,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command: {0} (type 'help' for available commands)")]
    Unknown(String),
    #[error("invalid flip direction {0:?}, use f, b, l or r")]
    FlipDirection(String),
    #[error("usage: rc forward|back|left|right|up|down [speed] [seconds]")]
    RcDirection,
}

impl Intent {
    /// Tokenizes one console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Intent>, ParseError> {
        let line = line.trim().to_lowercase();
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, args)) = parts.split_first() else {
            return Ok(None);
        };
        let arg = |i: usize| args.get(i).copied();

        let intent = match cmd {
            "takeoff" => Intent::Takeoff,
            "land" => Intent::Land,
            "emergency" => Intent::Emergency,
            "reconnect" => Intent::Reconnect,
            "cw" => Intent::Rotate {
                direction: RotateDirection::Clockwise,
                degrees: numeric_or(arg(0), DEFAULT_ROTATION_DEG, "degrees"),
            },
            "ccw" => Intent::Rotate {
                direction: RotateDirection::CounterClockwise,
                degrees: numeric_or(arg(0), DEFAULT_ROTATION_DEG, "degrees"),
            },
            "rotate" => Intent::Rotate {
                direction: if arg(1) == Some("cw") {
                    RotateDirection::Clockwise
                } else {
                    RotateDirection::CounterClockwise
                },
                degrees: numeric_or(arg(0), DEFAULT_ROTATION_DEG, "degrees"),
            },
            "flip" => {
                let d = arg(0).unwrap_or("f");
                Intent::Flip(FlipDirection::from_letter(d).ok_or_else(|| ParseError::FlipDirection(d.into()))?)
            }
            "rc" => {
                let direction = arg(0).and_then(MoveDirection::from_name).ok_or(ParseError::RcDirection)?;
                Intent::Rc {
                    direction,
                    speed: numeric_or(arg(1), DEFAULT_RC_SPEED, "speed"),
                    secs: match arg(2) {
                        None => DEFAULT_RC_SECS,
                        Some(s) => s.parse().unwrap_or_else(|_| {
                            warn!("invalid duration {:?}, using {}s", s, DEFAULT_RC_SECS);
                            DEFAULT_RC_SECS
                        }),
                    },
                }
            }
            "status" => Intent::Status,
            "battery" => Intent::Battery,
            "help" | "?" => Intent::Help,
            "quit" | "exit" | "q" => Intent::Quit,
            other => match MoveDirection::from_name(other) {
                Some(direction) => Intent::Move {
                    direction,
                    distance_cm: numeric_or(arg(0), DEFAULT_DISTANCE_CM, "distance"),
                },
                None => return Err(ParseError::Unknown(other.into())),
            },
        };
        Ok(Some(intent))
    }

    /// Intents that send something to the vehicle that changes its motion.
    pub fn is_flight_affecting(&self) -> bool {
        matches!(
            self,
            Intent::Takeoff
                | Intent::Land
                | Intent::Emergency
                | Intent::Move { .. }
                | Intent::Rotate { .. }
                | Intent::Flip(_)
                | Intent::Rc { .. }
        )
    }

    pub fn requires_airborne(&self) -> bool {
        matches!(self, Intent::Move { .. } | Intent::Rotate { .. } | Intent::Flip(_) | Intent::Rc { .. })
    }
}

fn numeric_or(arg: Option<&str>, default: i64, what: &str) -> i64 {
    match arg {
        None => default,
        Some(s) => s.parse().unwrap_or_else(|_| {
            warn!("invalid {} {:?}, using {}", what, s, default);
            default
        }),
    }
}

pub fn clamp_distance(cm: i64) -> u32 {
    cm.clamp(MIN_DISTANCE_CM, MAX_DISTANCE_CM) as u32
}

pub fn clamp_rotation(degrees: i64) -> u32 {
    degrees.clamp(MIN_ROTATION_DEG, MAX_ROTATION_DEG) as u32
}

pub fn clamp_rc_speed(speed: i64) -> i32 {
    speed.clamp(MIN_RC_SPEED, MAX_RC_SPEED) as i32
}

pub fn clamp_rc_duration(secs: f32) -> Duration {
    let secs = if secs.is_finite() { secs } else { DEFAULT_RC_SECS };
    Duration::from_secs_f32(secs.clamp(MIN_RC_SECS, MAX_RC_SECS))
}
