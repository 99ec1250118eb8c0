//! Supervision core of the ground station: session state, telemetry
//! sampling, flight-state reconciliation, link supervision and the command
//! executor that shares the link with them.

pub mod config;
pub mod controller;
pub mod doctor;
pub mod error;
pub mod estimator;
pub mod events;
pub mod executor;
pub mod intent;
pub mod sampler;
pub mod session;
pub mod supervision;
pub mod supervisor;

pub use config::ControlConfig;
pub use controller::Controller;
pub use error::{CommandError, ShutdownError};
pub use executor::{CommandExecutor, Outcome};
pub use intent::Intent;
pub use session::VehicleSession;
