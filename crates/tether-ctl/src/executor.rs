use std::fmt;
use std::time::Duration;
use tether_link::{Link, LinkError};
use tether_proto::command::{FlipDirection, MoveDirection, RotateDirection, Velocity};
use tether_proto::state::{CommandedState, ConnectionState};
use tether_proto::telemetry::{celsius_to_fahrenheit, StatusSnapshot};
use tracing::{info, warn};

use crate::config::{CommandConfig, ControlConfig};
use crate::error::CommandError;
use crate::events::EventSink;
use crate::intent::{self, Intent};
use crate::session::{lock, SharedLink, SharedSession};
use crate::supervisor::{ConnectionSupervisor, ReconnectOutcome};

/// Velocity fallback: the vehicle covers roughly this many cm per second at
/// the commanded stick speed.
const FALLBACK_CM_PER_SEC: f32 = 50.0;
const FALLBACK_MIN_SPEED: i64 = 20;
const FALLBACK_MAX_SPEED: i64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    TookOff { verified: bool },
    AlreadyAirborne,
    Landed { verified: bool },
    AlreadyGrounded,
    EmergencyStopped,
    Reconnected,
    Moved { direction: MoveDirection, distance_cm: u32, fallback: bool },
    Rotated { direction: RotateDirection, degrees: u32 },
    Flipped(FlipDirection),
    Drove { velocity: Velocity, duration: Duration },
    Status(StatusSnapshot),
    Battery(i32),
    Help,
    Quit,
}

/// Runs operator intents against the vehicle. Each intent holds the link
/// lock from the first check to the last byte sent, so supervision ticks
/// and reconnects never land in the middle of one.
#[derive(Clone)]
pub struct CommandExecutor {
    link: SharedLink,
    session: SharedSession,
    supervisor: ConnectionSupervisor,
    cfg: CommandConfig,
    events: EventSink,
}

impl CommandExecutor {
    pub fn new(link: SharedLink, session: SharedSession, cfg: &ControlConfig, events: EventSink) -> Self {
        Self {
            link,
            session,
            supervisor: ConnectionSupervisor::new(cfg),
            cfg: cfg.commands.clone(),
            events,
        }
    }

    pub async fn execute(&self, intent: Intent) -> Result<Outcome, CommandError> {
        match intent {
            Intent::Help => return Ok(Outcome::Help),
            Intent::Quit => return Ok(Outcome::Quit),
            _ => {}
        }
        if let Some(done) = self.check_commanded(&intent)? {
            return Ok(done);
        }

        let mut guard = self.link.lock().await;
        let link: &mut dyn Link = &mut **guard;

        // A supervision tick may have reconciled the commanded state while
        // this intent waited for the link.
        if let Some(done) = self.check_commanded(&intent)? {
            return Ok(done);
        }
        if intent.is_flight_affecting() {
            self.ensure_connected(link).await?;
            // So may the resync after a reconnect.
            if let Some(done) = self.check_commanded(&intent)? {
                return Ok(done);
            }
        }

        match intent {
            Intent::Takeoff => self.takeoff(link).await,
            Intent::Land => self.land(link).await,
            Intent::Emergency => self.emergency(link).await,
            Intent::Reconnect => self.reconnect(link).await,
            Intent::Move { direction, distance_cm } => self.move_by(link, direction, distance_cm).await,
            Intent::Rotate { direction, degrees } => {
                let degrees = intent::clamp_rotation(degrees);
                info!("rotating {} {} degrees", direction, degrees);
                link.rotate(direction, degrees).await?;
                Ok(Outcome::Rotated { direction, degrees })
            }
            Intent::Flip(direction) => {
                info!("flipping {}", direction);
                link.flip(direction).await?;
                Ok(Outcome::Flipped(direction))
            }
            Intent::Rc { direction, speed, secs } => {
                let velocity = direction.velocity(intent::clamp_rc_speed(speed));
                let duration = intent::clamp_rc_duration(secs);
                drive(link, velocity, duration).await?;
                Ok(Outcome::Drove { velocity, duration })
            }
            Intent::Status => Ok(Outcome::Status(self.snapshot(link).await)),
            Intent::Battery => Ok(Outcome::Battery(link.battery().await?)),
            Intent::Help => Ok(Outcome::Help),
            Intent::Quit => Ok(Outcome::Quit),
        }
    }

    /// Status snapshot for callers outside the dispatch path.
    pub async fn status(&self) -> StatusSnapshot {
        let mut guard = self.link.lock().await;
        self.snapshot(&mut **guard).await
    }

    fn commanded(&self) -> CommandedState {
        lock(&self.session).commanded
    }

    /// Takeoff and land against their own target state are no-ops;
    /// positioning needs the vehicle airborne.
    fn check_commanded(&self, intent: &Intent) -> Result<Option<Outcome>, CommandError> {
        let airborne = self.commanded().is_airborne();
        match intent {
            Intent::Takeoff if airborne => Ok(Some(Outcome::AlreadyAirborne)),
            Intent::Land if !airborne => Ok(Some(Outcome::AlreadyGrounded)),
            i if i.requires_airborne() && !airborne => Err(CommandError::must_take_off()),
            _ => Ok(None),
        }
    }

    fn set_commanded(&self, state: CommandedState) {
        lock(&self.session).commanded = state;
    }

    async fn ensure_connected(&self, link: &mut dyn Link) -> Result<(), CommandError> {
        let state = {
            let s = lock(&self.session);
            if s.is_connected() {
                return Ok(());
            }
            s.connection
        };
        warn!("link {}, attempting reconnection before command", state);
        let attempt = self.supervisor.reconnect(link, &self.session).await;
        self.events.emit_all(attempt.events);
        match attempt.outcome {
            ReconnectOutcome::Restored => Ok(()),
            ReconnectOutcome::Failed(e) => Err(CommandError::LinkUnavailable(e)),
        }
    }

    /// Waits for the vehicle to settle, then samples once and reconciles.
    /// True when telemetry agrees with `expected`.
    async fn verify(&self, link: &mut dyn Link, settle: Duration, expected: CommandedState) -> bool {
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        let report = self.supervisor.poll(link, &self.session).await;
        self.events.emit_all(report.events);
        report.sample.is_ok() && self.commanded() == expected
    }

    async fn takeoff(&self, link: &mut dyn Link) -> Result<Outcome, CommandError> {
        info!("taking off");
        link.takeoff().await?;
        self.set_commanded(CommandedState::Airborne);

        let verified = self.verify(link, self.cfg.takeoff_settle(), CommandedState::Airborne).await;
        if !verified {
            warn!("takeoff may have failed, check vehicle status");
        }
        Ok(Outcome::TookOff { verified })
    }

    async fn land(&self, link: &mut dyn Link) -> Result<Outcome, CommandError> {
        info!("landing");
        link.land().await?;
        self.set_commanded(CommandedState::Grounded);

        let verified = self.verify(link, self.cfg.land_settle(), CommandedState::Grounded).await;
        if !verified {
            warn!("landing may have failed, vehicle may still be airborne");
        }
        Ok(Outcome::Landed { verified })
    }

    async fn emergency(&self, link: &mut dyn Link) -> Result<Outcome, CommandError> {
        warn!("EMERGENCY STOP");
        link.emergency_stop().await?;
        self.set_commanded(CommandedState::Grounded);
        self.verify(link, self.cfg.emergency_settle(), CommandedState::Grounded).await;
        Ok(Outcome::EmergencyStopped)
    }

    async fn reconnect(&self, link: &mut dyn Link) -> Result<Outcome, CommandError> {
        let attempt = self.supervisor.reconnect(link, &self.session).await;
        self.events.emit_all(attempt.events);
        match attempt.outcome {
            ReconnectOutcome::Restored => Ok(Outcome::Reconnected),
            ReconnectOutcome::Failed(e) => Err(CommandError::LinkUnavailable(e)),
        }
    }

    async fn move_by(&self, link: &mut dyn Link, direction: MoveDirection, requested: i64) -> Result<Outcome, CommandError> {
        let cm = intent::clamp_distance(requested);
        if i64::from(cm) != requested {
            info!("distance {}cm clamped to {}cm", requested, cm);
        }
        info!("moving {} {}cm", direction, cm);

        match link.move_by(direction, cm).await {
            Ok(()) => Ok(Outcome::Moved { direction, distance_cm: cm, fallback: false }),
            Err(e) if e.is_attitude_fault() => {
                warn!("{}; falling back to velocity control", e);
                let speed = i64::from(cm).clamp(FALLBACK_MIN_SPEED, FALLBACK_MAX_SPEED) as i32;
                let duration = Duration::from_secs_f32(cm as f32 / FALLBACK_CM_PER_SEC);
                drive(link, direction.velocity(speed), duration).await?;
                Ok(Outcome::Moved { direction, distance_cm: cm, fallback: true })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn snapshot(&self, link: &mut dyn Link) -> StatusSnapshot {
        let (connection, commanded, observed, contact) = {
            let s = lock(&self.session);
            (s.connection, s.commanded, s.observed, s.contact_age())
        };
        let mut snap = StatusSnapshot {
            battery_pct: None,
            height_cm: None,
            temperature_f: None,
            speed: None,
            last_contact_ms: contact.map(|d| d.as_millis() as u64),
            connection,
            commanded,
            observed,
        };
        if connection == ConnectionState::Disconnected {
            return snap;
        }
        snap.battery_pct = link.battery().await.ok();
        snap.height_cm = link.height().await.ok();
        snap.temperature_f = link.temperature().await.ok().map(celsius_to_fahrenheit);
        snap.speed = link.speed().await.ok();
        snap
    }
}

/// Holds a stick command for `duration`, then centers the sticks. The stop
/// is sent even when the first command failed; the first error wins.
async fn drive(link: &mut dyn Link, velocity: Velocity, duration: Duration) -> Result<(), LinkError> {
    info!("velocity control {} for {:.1}s", velocity, duration.as_secs_f32());
    let sent = link.set_velocity(velocity).await;
    if sent.is_ok() {
        tokio::time::sleep(duration).await;
    }
    let stopped = link.set_velocity(Velocity::STOP).await;
    if let Err(e) = &stopped {
        warn!("stop command failed: {}", e);
    }
    sent.and(stopped)
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::TookOff { verified: true } => f.write_str("takeoff successful"),
            Outcome::TookOff { verified: false } => f.write_str("takeoff sent, but the vehicle does not look airborne"),
            Outcome::AlreadyAirborne => f.write_str("already flying"),
            Outcome::Landed { verified: true } => f.write_str("landed"),
            Outcome::Landed { verified: false } => f.write_str("land sent, but the vehicle still looks airborne"),
            Outcome::AlreadyGrounded => f.write_str("not flying"),
            Outcome::EmergencyStopped => f.write_str("emergency stop sent, motors off"),
            Outcome::Reconnected => f.write_str("reconnected"),
            Outcome::Moved { direction, distance_cm, fallback: false } => write!(f, "moved {} {}cm", direction, distance_cm),
            Outcome::Moved { direction, distance_cm, fallback: true } => {
                write!(f, "moved {} {}cm (velocity fallback)", direction, distance_cm)
            }
            Outcome::Rotated { direction, degrees } => write!(f, "rotated {} {} degrees", direction, degrees),
            Outcome::Flipped(d) => write!(f, "flipped {}", d),
            Outcome::Drove { velocity, duration } => {
                write!(f, "velocity {} held for {:.1}s", velocity, duration.as_secs_f32())
            }
            Outcome::Status(s) => write!(f, "{}", s),
            Outcome::Battery(pct) => write!(f, "battery: {}%", pct),
            Outcome::Help => f.write_str("help"),
            Outcome::Quit => f.write_str("quit"),
        }
    }
}
