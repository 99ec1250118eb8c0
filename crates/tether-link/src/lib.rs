pub mod doctor;
pub mod sdk;
pub mod sim;

use async_trait::async_trait;
use serde::Deserialize;
use tether_proto::command::{FlipDirection, MoveDirection, RotateDirection, Velocity};
use tether_proto::telemetry::Attitude;

pub use sdk::SdkLink;
pub use sim::{SimCall, SimHandle, SimLink};

pub type LinkResult<T> = Result<T, LinkError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("timed out waiting for reply to `{0}`")]
    Timeout(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("vehicle rejected `{command}`: {reason}")]
    Rejected { command: String, reason: String },
    #[error("unexpected reply to `{command}`: {reply:?}")]
    Malformed { command: String, reply: String },
    #[error("link is not connected")]
    NotConnected,
}

impl LinkError {
    /// The vehicle refused a positioning command because it has no usable
    /// attitude reference ("No valid imu"). Velocity control still works in
    /// that state.
    pub fn is_attitude_fault(&self) -> bool {
        match self {
            LinkError::Rejected { reason, .. } => reason.to_ascii_lowercase().contains("no valid imu"),
            _ => false,
        }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(e: std::io::Error) -> Self {
        LinkError::Transport(e.to_string())
    }
}

/// Transport to one vehicle. Calls are request/response unless noted;
/// any of them may fail. Implementations are not reentrant: callers
/// serialize access.
#[async_trait]
pub trait Link: Send {
    async fn connect(&mut self) -> LinkResult<()>;
    async fn disconnect(&mut self);

    async fn takeoff(&mut self) -> LinkResult<()>;
    async fn land(&mut self) -> LinkResult<()>;
    async fn emergency_stop(&mut self) -> LinkResult<()>;
    async fn move_by(&mut self, dir: MoveDirection, cm: u32) -> LinkResult<()>;
    async fn rotate(&mut self, dir: RotateDirection, degrees: u32) -> LinkResult<()>;
    async fn flip(&mut self, dir: FlipDirection) -> LinkResult<()>;
    /// Fire-and-forget stick command.
    async fn set_velocity(&mut self, v: Velocity) -> LinkResult<()>;

    async fn battery(&mut self) -> LinkResult<i32>;
    async fn height(&mut self) -> LinkResult<i32>;
    /// Degrees Celsius.
    async fn temperature(&mut self) -> LinkResult<i32>;
    async fn attitude(&mut self) -> LinkResult<Attitude>;
    async fn speed(&mut self) -> LinkResult<i32>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Vehicle address. The Tello access point always hands out 192.168.10.1.
    pub host: String,
    /// SDK command port on the vehicle.
    pub port: u16,

    /// Local UDP port to bind; 0 lets the OS pick.
    pub local_port: u16,

    /// Per-request reply timeout.
    pub response_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: "192.168.10.1".into(),
            port: 8889,
            local_port: 0,
            response_timeout_ms: 7000,
        }
    }
}

impl LinkConfig {
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn response_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.response_timeout_ms)
    }
}
