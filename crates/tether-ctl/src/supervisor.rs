use std::time::Instant;
use tether_link::{Link, LinkError};
use tether_proto::state::{ConnectionState, ObservedState};
use tether_proto::telemetry::{FlightEvent, TelemetrySample};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::config::ControlConfig;
use crate::estimator::FlightStateEstimator;
use crate::sampler::{LivenessFailure, TelemetrySampler};
use crate::session::{lock, SharedSession, VehicleSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    /// Degraded → Connected.
    Recovered,
    /// Connected → Degraded.
    Degraded,
    /// Into Disconnected; a reconnect is due.
    Lost,
}

#[derive(Debug)]
pub enum ReconnectOutcome {
    Restored,
    Failed(LinkError),
}

/// One reconnect try. Only the streak counter in the session outlives it.
#[derive(Debug)]
pub struct ReconnectionAttempt {
    pub started_at: OffsetDateTime,
    pub outcome: ReconnectOutcome,
    pub events: Vec<FlightEvent>,
}

/// Result of one sample → liveness → reconciliation pass.
#[derive(Debug)]
pub struct PollReport {
    pub transition: Transition,
    pub sample: Result<TelemetrySample, LivenessFailure>,
    pub events: Vec<FlightEvent>,
}

/// Tracks link health from liveness results and rebuilds the link when it
/// is lost. Callers hold the link lock for every method taking a link.
#[derive(Debug, Clone)]
pub struct ConnectionSupervisor {
    failure_limit: u32,
    settle: std::time::Duration,
    low_battery_pct: i32,
    sampler: TelemetrySampler,
    estimator: FlightStateEstimator,
}

impl ConnectionSupervisor {
    pub fn new(cfg: &ControlConfig) -> Self {
        Self {
            failure_limit: cfg.supervision.liveness_failure_limit,
            settle: cfg.supervision.reconnect_settle(),
            low_battery_pct: cfg.commands.low_battery_pct,
            sampler: TelemetrySampler,
            estimator: FlightStateEstimator::new(cfg.estimator.clone()),
        }
    }

    pub fn on_liveness(&self, session: &mut VehicleSession, live: bool) -> Transition {
        if live {
            session.consecutive_liveness_failures = 0;
            session.last_contact = Some(Instant::now());
            return match session.connection {
                ConnectionState::Degraded => {
                    session.connection = ConnectionState::Connected;
                    Transition::Recovered
                }
                // Only a reconnect brings a lost link back.
                ConnectionState::Connected | ConnectionState::Disconnected => Transition::Unchanged,
            };
        }

        if session.connection == ConnectionState::Disconnected {
            return Transition::Unchanged;
        }
        session.consecutive_liveness_failures += 1;
        if session.consecutive_liveness_failures > self.failure_limit {
            session.connection = ConnectionState::Disconnected;
            session.observed = ObservedState::Unknown;
            session.last_height_cm = None;
            Transition::Lost
        } else if session.connection == ConnectionState::Connected {
            session.connection = ConnectionState::Degraded;
            Transition::Degraded
        } else {
            Transition::Unchanged
        }
    }

    /// Samples once, updates link health and, when the vehicle answered,
    /// reconciles flight state.
    pub async fn poll(&self, link: &mut dyn Link, session: &SharedSession) -> PollReport {
        let sample = self.sampler.sample(link).await;

        let mut s = lock(session);
        let transition = self.on_liveness(&mut s, sample.is_ok());
        let mut events = Vec::new();
        match transition {
            Transition::Degraded => events.push(FlightEvent::LinkDegraded { failures: s.consecutive_liveness_failures }),
            Transition::Lost => events.push(FlightEvent::LinkLost { failures: s.consecutive_liveness_failures }),
            Transition::Recovered => info!("link: recovered"),
            Transition::Unchanged => {}
        }

        match &sample {
            Ok(sm) => {
                events.extend(self.estimator.apply(&mut s, sm));
                events.extend(self.check_battery(&mut s, sm.battery_pct));
            }
            Err(e) => warn!("liveness probe failed ({} in a row): {}", s.consecutive_liveness_failures, e),
        }
        PollReport { transition, sample, events }
    }

    fn check_battery(&self, s: &mut VehicleSession, pct: i32) -> Option<FlightEvent> {
        s.last_battery_pct = Some(pct);
        if pct >= self.low_battery_pct {
            s.low_battery_warned = false;
            return None;
        }
        if s.low_battery_warned {
            return None;
        }
        s.low_battery_warned = true;
        Some(FlightEvent::LowBattery { pct })
    }

    /// Tears the link down and brings it back up: a single attempt. On
    /// success the flight state is resynchronized from a fresh sample,
    /// since the vehicle may have landed by itself while unreachable.
    /// The commanded state is left to that reconciliation.
    pub async fn reconnect(&self, link: &mut dyn Link, session: &SharedSession) -> ReconnectionAttempt {
        let started_at = OffsetDateTime::now_utc();
        info!("link: reconnecting");

        link.disconnect().await;
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        if let Err(e) = link.connect().await {
            let streak = {
                let mut s = lock(session);
                s.connection = ConnectionState::Disconnected;
                s.observed = ObservedState::Unknown;
                s.reconnect_failures += 1;
                s.reconnect_failures
            };
            warn!("link: reconnect failed: {}", e);
            return ReconnectionAttempt {
                started_at,
                outcome: ReconnectOutcome::Failed(e),
                events: vec![FlightEvent::ReconnectFailed { streak }],
            };
        }

        {
            let mut s = lock(session);
            s.connection = ConnectionState::Connected;
            s.consecutive_liveness_failures = 0;
            s.reconnect_failures = 0;
            s.last_height_cm = None;
            s.last_contact = Some(Instant::now());
        }
        info!("link: reconnected");

        let mut events = vec![FlightEvent::Reconnected];
        let resync = self.poll(link, session).await;
        if let Err(e) = &resync.sample {
            warn!("link: resync after reconnect failed: {}", e);
        }
        events.extend(resync.events);

        ReconnectionAttempt { started_at, outcome: ReconnectOutcome::Restored, events }
    }
}
