use anyhow::Result;

use crate::config::{CommandConfig, ControlConfig, EstimatorConfig, SupervisionConfig};

pub fn check_control(cfg: &ControlConfig) -> Result<()> {
    check_estimator(&cfg.estimator)?;
    check_supervision(&cfg.supervision)?;
    check_commands(&cfg.commands)?;
    Ok(())
}

pub fn check_estimator(e: &EstimatorConfig) -> Result<()> {
    anyhow::ensure!(e.crash_height_cm > 0, "estimator.crash_height_cm must be positive");
    anyhow::ensure!(
        e.crash_height_cm < e.liftoff_height_cm,
        "estimator.crash_height_cm must be below liftoff_height_cm"
    );
    anyhow::ensure!(e.jump_threshold_cm > 0, "estimator.jump_threshold_cm must be positive");
    Ok(())
}

pub fn check_supervision(s: &SupervisionConfig) -> Result<()> {
    anyhow::ensure!(s.airborne_poll_ms >= 100, "supervision.airborne_poll_ms too small");
    anyhow::ensure!(
        s.airborne_poll_ms <= s.grounded_poll_ms,
        "supervision.airborne_poll_ms should not exceed grounded_poll_ms"
    );
    anyhow::ensure!(s.liveness_failure_limit >= 1, "supervision.liveness_failure_limit must be >= 1");
    anyhow::ensure!(s.reconnect_settle_ms <= 10_000, "supervision.reconnect_settle_ms should be <= 10000");
    Ok(())
}

pub fn check_commands(c: &CommandConfig) -> Result<()> {
    anyhow::ensure!((0..=100).contains(&c.low_battery_pct), "commands.low_battery_pct should be 0..100");
    anyhow::ensure!(c.takeoff_settle_ms <= 15_000, "commands.takeoff_settle_ms should be <= 15000");
    Ok(())
}
