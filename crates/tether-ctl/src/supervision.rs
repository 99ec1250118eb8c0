use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tether_link::LinkError;
use tether_proto::state::{ConnectionState, ObservedState};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ControlConfig, SupervisionConfig};
use crate::events::EventSink;
use crate::session::{lock, SharedLink, SharedSession};
use crate::supervisor::{ConnectionSupervisor, ReconnectOutcome, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Polled(Transition),
    Reconnected,
}

/// Background scheduler: sample, feed the connection supervisor, reconcile,
/// sleep. Polls faster while the vehicle is observed airborne, since that
/// interval bounds crash-detection latency.
pub struct SupervisionLoop {
    link: SharedLink,
    session: SharedSession,
    supervisor: ConnectionSupervisor,
    cfg: SupervisionConfig,
    events: EventSink,
    running: Arc<AtomicBool>,
}

impl SupervisionLoop {
    pub fn new(
        link: SharedLink,
        session: SharedSession,
        cfg: &ControlConfig,
        events: EventSink,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            link,
            session,
            supervisor: ConnectionSupervisor::new(cfg),
            cfg: cfg.supervision.clone(),
            events,
            running,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        info!("supervision: started");
        while self.running.load(Ordering::SeqCst) {
            match self.tick().await {
                Ok(t) => debug!(?t, "supervision tick"),
                Err(e) => warn!("supervision tick failed: {}", e),
            }
            tokio::time::sleep(self.interval()).await;
        }
        info!("supervision: stopped");
    }

    /// One pass. While the link is lost the tick is spent on a reconnect
    /// attempt instead of a probe; a failed attempt is retried next tick.
    pub async fn tick(&self) -> Result<Tick, LinkError> {
        let mut guard = self.link.lock().await;
        let link = &mut **guard;

        let lost = lock(&self.session).connection == ConnectionState::Disconnected;
        if lost {
            let attempt = self.supervisor.reconnect(link, &self.session).await;
            self.events.emit_all(attempt.events);
            return match attempt.outcome {
                ReconnectOutcome::Restored => Ok(Tick::Reconnected),
                ReconnectOutcome::Failed(e) => Err(e),
            };
        }

        let report = self.supervisor.poll(link, &self.session).await;
        self.events.emit_all(report.events);
        Ok(Tick::Polled(report.transition))
    }

    pub fn interval(&self) -> Duration {
        match lock(&self.session).observed {
            ObservedState::Airborne => self.cfg.airborne_poll(),
            ObservedState::Grounded | ObservedState::Unknown => self.cfg.grounded_poll(),
        }
    }
}
