use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub estimator: EstimatorConfig,
    pub supervision: SupervisionConfig,
    pub commands: CommandConfig,
}

/// Height thresholds for reconciling commanded and observed flight state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Below this while commanded airborne: the vehicle is down.
    pub crash_height_cm: i32,
    /// Above this while commanded grounded: the vehicle is up.
    pub liftoff_height_cm: i32,
    /// Sample-to-sample change reported as an anomaly while airborne.
    pub jump_threshold_cm: i32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self { crash_height_cm: 10, liftoff_height_cm: 30, jump_threshold_cm: 50 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisionConfig {
    pub airborne_poll_ms: u64,
    pub grounded_poll_ms: u64,
    /// Consecutive missed probes tolerated before the link counts as lost.
    pub liveness_failure_limit: u32,
    /// Pause between tearing the link down and bringing it back up.
    pub reconnect_settle_ms: u64,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            airborne_poll_ms: 1000,
            grounded_poll_ms: 2000,
            liveness_failure_limit: 3,
            reconnect_settle_ms: 2000,
        }
    }
}

impl SupervisionConfig {
    pub fn airborne_poll(&self) -> Duration {
        Duration::from_millis(self.airborne_poll_ms)
    }

    pub fn grounded_poll(&self) -> Duration {
        Duration::from_millis(self.grounded_poll_ms)
    }

    pub fn reconnect_settle(&self) -> Duration {
        Duration::from_millis(self.reconnect_settle_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Wait after takeoff before checking height (IMU stabilization).
    pub takeoff_settle_ms: u64,
    pub land_settle_ms: u64,
    pub emergency_settle_ms: u64,
    pub low_battery_pct: i32,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            takeoff_settle_ms: 5000,
            land_settle_ms: 3000,
            emergency_settle_ms: 2000,
            low_battery_pct: 20,
        }
    }
}

impl CommandConfig {
    pub fn takeoff_settle(&self) -> Duration {
        Duration::from_millis(self.takeoff_settle_ms)
    }

    pub fn land_settle(&self) -> Duration {
        Duration::from_millis(self.land_settle_ms)
    }

    pub fn emergency_settle(&self) -> Duration {
        Duration::from_millis(self.emergency_settle_ms)
    }
}

impl ControlConfig {
    /// Same thresholds, no settle or reconnect delays. Used by tests and
    /// the simulator, where the vehicle reacts instantly.
    pub fn instant() -> Self {
        Self {
            estimator: EstimatorConfig::default(),
            supervision: SupervisionConfig { reconnect_settle_ms: 0, ..SupervisionConfig::default() },
            commands: CommandConfig {
                takeoff_settle_ms: 0,
                land_settle_ms: 0,
                emergency_settle_ms: 0,
                ..CommandConfig::default()
            },
        }
    }
}
