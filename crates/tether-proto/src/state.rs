use serde::{Deserialize, Serialize};
use std::fmt;

/// Flight state the controller believes it has requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandedState {
    Grounded,
    Airborne,
}

/// Flight state inferred from height telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservedState {
    Grounded,
    Airborne,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    Degraded,
    Disconnected,
}

impl CommandedState {
    pub fn is_airborne(self) -> bool {
        self == CommandedState::Airborne
    }
}

impl From<CommandedState> for ObservedState {
    fn from(s: CommandedState) -> Self {
        match s {
            CommandedState::Grounded => ObservedState::Grounded,
            CommandedState::Airborne => ObservedState::Airborne,
        }
    }
}

impl fmt::Display for CommandedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandedState::Grounded => f.write_str("grounded"),
            CommandedState::Airborne => f.write_str("airborne"),
        }
    }
}

impl fmt::Display for ObservedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservedState::Grounded => f.write_str("grounded"),
            ObservedState::Airborne => f.write_str("airborne"),
            ObservedState::Unknown => f.write_str("unknown"),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Degraded => f.write_str("degraded"),
            ConnectionState::Disconnected => f.write_str("disconnected"),
        }
    }
}
