use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use crate::state::{CommandedState, ConnectionState, ObservedState};

/// One poll of the vehicle. Consumed by the estimator and then dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub height_cm: i32,
    pub battery_pct: i32,
    pub taken_at: OffsetDateTime,
}

impl TelemetrySample {
    pub fn new(height_cm: i32, battery_pct: i32) -> Self {
        Self { height_cm, battery_pct, taken_at: OffsetDateTime::now_utc() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attitude {
    pub pitch: i32,
    pub roll: i32,
    pub yaw: i32,
}

/// State corrections and advisories raised while supervising the vehicle.
/// None of these are errors; they are surfaced to the operator as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightEvent {
    /// Commanded airborne, but the vehicle is on the ground.
    CrashDetected { height_cm: i32 },
    /// Commanded grounded, but the vehicle is in the air.
    UnexpectedLiftoff { height_cm: i32 },
    AnomalousHeightJump { from_cm: i32, to_cm: i32 },
    LinkDegraded { failures: u32 },
    LinkLost { failures: u32 },
    Reconnected,
    ReconnectFailed { streak: u32 },
    LowBattery { pct: i32 },
}

impl FlightEvent {
    /// Events that force the commanded state to follow telemetry.
    pub fn is_reconciliation(&self) -> bool {
        matches!(self, FlightEvent::CrashDetected { .. } | FlightEvent::UnexpectedLiftoff { .. })
    }
}

impl fmt::Display for FlightEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightEvent::CrashDetected { height_cm } => {
                write!(f, "CRASH DETECTED: height {}cm, flight state set to grounded", height_cm)
            }
            FlightEvent::UnexpectedLiftoff { height_cm } => {
                write!(f, "UNEXPECTED FLIGHT: height {}cm, flight state set to airborne", height_cm)
            }
            FlightEvent::AnomalousHeightJump { from_cm, to_cm } => {
                write!(f, "sudden height change: {}cm -> {}cm", from_cm, to_cm)
            }
            FlightEvent::LinkDegraded { failures } => write!(f, "link degraded ({} missed probes)", failures),
            FlightEvent::LinkLost { failures } => {
                write!(f, "connection lost after {} missed probes, reconnecting", failures)
            }
            FlightEvent::Reconnected => f.write_str("reconnection successful"),
            FlightEvent::ReconnectFailed { streak } => write!(f, "reconnection failed ({} in a row)", streak),
            FlightEvent::LowBattery { pct } => write!(f, "low battery: {}%", pct),
        }
    }
}

/// Read-only view returned by the status query. Link readings are
/// best-effort and absent when the query failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub battery_pct: Option<i32>,
    pub height_cm: Option<i32>,
    pub temperature_f: Option<i32>,
    pub speed: Option<i32>,
    /// Time since the vehicle last answered a liveness probe.
    pub last_contact_ms: Option<u64>,
    pub connection: ConnectionState,
    pub commanded: CommandedState,
    pub observed: ObservedState,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt(v: Option<i32>, unit: &str) -> String {
            v.map(|v| format!("{}{}", v, unit)).unwrap_or_else(|| "n/a".into())
        }
        writeln!(f, "battery:     {}", opt(self.battery_pct, "%"))?;
        writeln!(f, "height:      {}", opt(self.height_cm, "cm"))?;
        writeln!(f, "temperature: {}", opt(self.temperature_f, "F"))?;
        writeln!(f, "speed:       {}", opt(self.speed, " cm/s"))?;
        match self.last_contact_ms {
            Some(ms) => writeln!(f, "last contact: {:.1}s ago", ms as f64 / 1000.0)?,
            None => writeln!(f, "last contact: never")?,
        }
        writeln!(f, "connection:  {}", self.connection)?;
        writeln!(f, "commanded:   {}", self.commanded)?;
        write!(f, "observed:    {}", self.observed)
    }
}

pub fn celsius_to_fahrenheit(c: i32) -> i32 {
    (c * 9 + 2) / 5 + 32
}
