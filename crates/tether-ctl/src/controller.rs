use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tether_link::{Link, LinkError};
use tether_proto::state::CommandedState;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ControlConfig;
use crate::error::{CommandError, ShutdownError};
use crate::events::EventSink;
use crate::executor::{CommandExecutor, Outcome};
use crate::intent::Intent;
use crate::session::{self, lock, SharedLink, SharedSession, VehicleSession};
use crate::supervision::SupervisionLoop;

/// One vehicle session from connect to shutdown.
pub struct Controller {
    link: SharedLink,
    session: SharedSession,
    executor: CommandExecutor,
    cfg: ControlConfig,
    events: EventSink,
    running: Arc<AtomicBool>,
    supervision: Option<JoinHandle<()>>,
}

impl Controller {
    pub async fn connect(mut link: Box<dyn Link>, cfg: ControlConfig, events: EventSink) -> Result<Self, LinkError> {
        link.connect().await?;
        info!("controller: vehicle connected");

        let link = session::shared_link(link);
        let session = session::shared(VehicleSession::connected());
        let executor = CommandExecutor::new(link.clone(), session.clone(), &cfg, events.clone());
        Ok(Self {
            link,
            session,
            executor,
            cfg,
            events,
            running: Arc::new(AtomicBool::new(true)),
            supervision: None,
        })
    }

    pub fn start_supervision(&mut self) {
        if self.supervision.is_some() {
            return;
        }
        let sup = SupervisionLoop::new(
            self.link.clone(),
            self.session.clone(),
            &self.cfg,
            self.events.clone(),
            self.running.clone(),
        );
        self.supervision = Some(sup.spawn());
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Copy of the current session state.
    pub fn session(&self) -> VehicleSession {
        lock(&self.session).clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Command dispatch boundary: one operator line in, one outcome out.
    /// Blank lines are ignored; `quit` ends the session.
    pub async fn dispatch(&self, line: &str) -> Result<Option<Outcome>, CommandError> {
        let Some(intent) = Intent::parse(line)? else {
            return Ok(None);
        };
        debug!(?intent, "dispatch");
        let outcome = self.executor.execute(intent).await?;
        if outcome == Outcome::Quit {
            self.request_stop();
        }
        Ok(Some(outcome))
    }

    /// Stops supervision, lands if still commanded airborne and closes the
    /// link. Teardown always completes; a failed landing is reported after
    /// the fact.
    pub async fn shutdown(mut self) -> Result<(), ShutdownError> {
        self.request_stop();
        if let Some(handle) = self.supervision.take() {
            if let Err(e) = handle.await {
                warn!("supervision task ended abnormally: {}", e);
            }
        }

        let mut guard = self.link.lock().await;
        let link = &mut **guard;

        let airborne = lock(&self.session).commanded.is_airborne();
        let mut result = Ok(());
        if airborne {
            info!("shutdown: landing");
            match link.land().await {
                Ok(()) => lock(&self.session).commanded = CommandedState::Grounded,
                Err(e) => {
                    error!("shutdown: landing failed: {}", e);
                    result = Err(ShutdownError::LandingFailed(e));
                }
            }
        }
        link.disconnect().await;
        info!("controller: session closed");
        result
    }
}
