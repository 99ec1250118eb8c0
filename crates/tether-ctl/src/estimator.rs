use tether_proto::state::{CommandedState, ObservedState};
use tether_proto::telemetry::{FlightEvent, TelemetrySample};

use crate::config::EstimatorConfig;
use crate::session::VehicleSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Estimate {
    pub observed: ObservedState,
    /// Equal to the input unless a reconciliation forced it.
    pub commanded: CommandedState,
    pub events: Vec<FlightEvent>,
}

/// Infers the physical flight state from height and reconciles it with the
/// commanded one.
#[derive(Debug, Clone, Default)]
pub struct FlightStateEstimator {
    cfg: EstimatorConfig,
}

impl FlightStateEstimator {
    pub fn new(cfg: EstimatorConfig) -> Self {
        Self { cfg }
    }

    /// First matching rule wins: crash, unexpected liftoff, height jump.
    pub fn reconcile(
        &self,
        sample: &TelemetrySample,
        commanded: CommandedState,
        previous_height: Option<i32>,
    ) -> Estimate {
        let h = sample.height_cm;
        match commanded {
            CommandedState::Airborne if h < self.cfg.crash_height_cm => Estimate {
                observed: ObservedState::Grounded,
                commanded: CommandedState::Grounded,
                events: vec![FlightEvent::CrashDetected { height_cm: h }],
            },
            CommandedState::Grounded if h > self.cfg.liftoff_height_cm => Estimate {
                observed: ObservedState::Airborne,
                commanded: CommandedState::Airborne,
                events: vec![FlightEvent::UnexpectedLiftoff { height_cm: h }],
            },
            _ => {
                let mut events = Vec::new();
                if commanded == CommandedState::Airborne {
                    if let Some(prev) = previous_height.filter(|p| *p > 0) {
                        if (h - prev).abs() > self.cfg.jump_threshold_cm {
                            events.push(FlightEvent::AnomalousHeightJump { from_cm: prev, to_cm: h });
                        }
                    }
                }
                Estimate { observed: commanded.into(), commanded, events }
            }
        }
    }

    /// Reconciles against the session and writes the result back.
    pub fn apply(&self, session: &mut VehicleSession, sample: &TelemetrySample) -> Vec<FlightEvent> {
        let est = self.reconcile(sample, session.commanded, session.last_height_cm);
        session.observed = est.observed;
        session.commanded = est.commanded;
        session.last_height_cm = Some(sample.height_cm);
        est.events
    }
}
