use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tether_link::Link;
use tether_proto::state::{CommandedState, ConnectionState, ObservedState};

/// Everything the controller knows about the vehicle. One instance per
/// process, shared between the supervision task and the command path.
#[derive(Debug, Clone)]
pub struct VehicleSession {
    pub commanded: CommandedState,
    pub observed: ObservedState,
    pub connection: ConnectionState,
    pub last_height_cm: Option<i32>,
    pub consecutive_liveness_failures: u32,
    pub reconnect_failures: u32,
    pub last_battery_pct: Option<i32>,
    pub low_battery_warned: bool,
    pub last_contact: Option<Instant>,
}

impl Default for VehicleSession {
    fn default() -> Self {
        Self {
            commanded: CommandedState::Grounded,
            observed: ObservedState::Unknown,
            connection: ConnectionState::Disconnected,
            last_height_cm: None,
            consecutive_liveness_failures: 0,
            reconnect_failures: 0,
            last_battery_pct: None,
            low_battery_warned: false,
            last_contact: None,
        }
    }
}

impl VehicleSession {
    pub fn connected() -> Self {
        Self { connection: ConnectionState::Connected, last_contact: Some(Instant::now()), ..Self::default() }
    }

    pub fn contact_age(&self) -> Option<Duration> {
        self.last_contact.map(|t| t.elapsed())
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}

pub type SharedSession = Arc<Mutex<VehicleSession>>;

/// The single link to the vehicle. Holding this lock is what serializes
/// supervision ticks, reconnects and operator commands.
pub type SharedLink = Arc<tokio::sync::Mutex<Box<dyn Link>>>;

pub fn shared(session: VehicleSession) -> SharedSession {
    Arc::new(Mutex::new(session))
}

pub fn shared_link(link: Box<dyn Link>) -> SharedLink {
    Arc::new(tokio::sync::Mutex::new(link))
}

/// Poisoning is ignored: every session update is a plain field write.
pub fn lock(session: &SharedSession) -> MutexGuard<'_, VehicleSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
