use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tether_ctl::config::ControlConfig;
use tether_ctl::events::EventSink;
use tether_ctl::session::{self, lock, SharedSession, VehicleSession};
use tether_ctl::supervision::{SupervisionLoop, Tick};
use tether_ctl::supervisor::Transition;
use tether_ctl::{CommandExecutor, Intent};
use tether_link::{Link, SimCall, SimHandle, SimLink};
use tether_proto::state::{CommandedState, ConnectionState, ObservedState};
use tether_proto::telemetry::FlightEvent;
use tokio::sync::mpsc;

struct Rig {
    sup: SupervisionLoop,
    exec: CommandExecutor,
    session: SharedSession,
    sim: SimHandle,
    events: mpsc::Receiver<FlightEvent>,
}

async fn rig() -> Rig {
    let (mut link, sim) = SimLink::new();
    link.connect().await.unwrap();

    let cfg = ControlConfig::instant();
    let (sink, events) = EventSink::channel(64);
    let link = session::shared_link(Box::new(link));
    let session = session::shared(VehicleSession::connected());
    let sup = SupervisionLoop::new(
        link.clone(),
        session.clone(),
        &cfg,
        sink.clone(),
        Arc::new(AtomicBool::new(true)),
    );
    let exec = CommandExecutor::new(link, session.clone(), &cfg, sink);
    sim.clear_calls();
    Rig { sup, exec, session, sim, events }
}

fn drain(rx: &mut mpsc::Receiver<FlightEvent>) -> Vec<FlightEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn lost_after_fourth_failure_reconnects_on_fifth_tick() {
    let mut r = rig().await;
    r.sim.fail_liveness(4);

    assert_eq!(r.sup.tick().await.unwrap(), Tick::Polled(Transition::Degraded));
    for _ in 0..2 {
        assert_eq!(r.sup.tick().await.unwrap(), Tick::Polled(Transition::Unchanged));
        assert_eq!(lock(&r.session).connection, ConnectionState::Degraded);
    }

    assert_eq!(r.sup.tick().await.unwrap(), Tick::Polled(Transition::Lost));
    assert_eq!(lock(&r.session).connection, ConnectionState::Disconnected);
    assert_eq!(lock(&r.session).observed, ObservedState::Unknown);
    assert_eq!(r.sim.count(&SimCall::Connect), 0);

    assert_eq!(r.sup.tick().await.unwrap(), Tick::Reconnected);
    assert_eq!(r.sim.count(&SimCall::Connect), 1);
    assert_eq!(lock(&r.session).connection, ConnectionState::Connected);
    assert_eq!(lock(&r.session).consecutive_liveness_failures, 0);

    assert_eq!(
        drain(&mut r.events),
        vec![
            FlightEvent::LinkDegraded { failures: 1 },
            FlightEvent::LinkLost { failures: 4 },
            FlightEvent::Reconnected,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn degraded_link_recovers_on_success() {
    let r = rig().await;
    r.sim.fail_liveness(2);

    assert_eq!(r.sup.tick().await.unwrap(), Tick::Polled(Transition::Degraded));
    assert_eq!(r.sup.tick().await.unwrap(), Tick::Polled(Transition::Unchanged));
    assert_eq!(r.sup.tick().await.unwrap(), Tick::Polled(Transition::Recovered));

    let s = lock(&r.session);
    assert_eq!(s.connection, ConnectionState::Connected);
    assert_eq!(s.consecutive_liveness_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_reconnect_is_retried_next_tick() {
    let r = rig().await;
    r.sim.fail_liveness(4);
    r.sim.fail_connects(1);
    for _ in 0..4 {
        r.sup.tick().await.unwrap();
    }

    assert!(r.sup.tick().await.is_err());
    assert_eq!(lock(&r.session).reconnect_failures, 1);
    assert_eq!(lock(&r.session).connection, ConnectionState::Disconnected);

    assert_eq!(r.sup.tick().await.unwrap(), Tick::Reconnected);
    assert_eq!(lock(&r.session).reconnect_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn silent_crash_is_reconciled() {
    let mut r = rig().await;
    r.exec.execute(Intent::Takeoff).await.unwrap();
    drain(&mut r.events);

    r.sim.script_heights([120, 115, 8, 7]);
    for _ in 0..2 {
        r.sup.tick().await.unwrap();
        assert_eq!(lock(&r.session).commanded, CommandedState::Airborne);
    }
    r.sup.tick().await.unwrap();

    assert_eq!(lock(&r.session).commanded, CommandedState::Grounded);
    assert_eq!(lock(&r.session).observed, ObservedState::Grounded);
    assert_eq!(drain(&mut r.events), vec![FlightEvent::CrashDetected { height_cm: 8 }]);

    // Stays quiet once reconciled.
    r.sup.tick().await.unwrap();
    assert!(drain(&mut r.events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn drift_on_the_ground_is_reconciled() {
    let mut r = rig().await;
    r.sim.script_heights([2, 5, 45]);
    for _ in 0..3 {
        r.sup.tick().await.unwrap();
    }

    assert_eq!(lock(&r.session).commanded, CommandedState::Airborne);
    assert_eq!(drain(&mut r.events), vec![FlightEvent::UnexpectedLiftoff { height_cm: 45 }]);
}

#[tokio::test(start_paused = true)]
async fn reconnect_resync_catches_auto_landing() {
    let mut r = rig().await;
    r.exec.execute(Intent::Takeoff).await.unwrap();
    drain(&mut r.events);

    r.sim.auto_land();
    r.sim.fail_liveness(4);
    for _ in 0..5 {
        r.sup.tick().await.unwrap();
    }

    assert_eq!(lock(&r.session).commanded, CommandedState::Grounded);
    let events = drain(&mut r.events);
    assert_eq!(&events[events.len() - 2..], &[FlightEvent::Reconnected, FlightEvent::CrashDetected { height_cm: 0 }]);
}

#[tokio::test(start_paused = true)]
async fn low_battery_is_reported_once() {
    let mut r = rig().await;
    r.sim.set_battery(15);
    for _ in 0..3 {
        r.sup.tick().await.unwrap();
    }
    assert_eq!(drain(&mut r.events), vec![FlightEvent::LowBattery { pct: 15 }]);
}

#[tokio::test(start_paused = true)]
async fn polls_faster_while_airborne() {
    let r = rig().await;
    r.sup.tick().await.unwrap();
    assert_eq!(r.sup.interval(), Duration::from_secs(2));

    r.exec.execute(Intent::Takeoff).await.unwrap();
    assert_eq!(r.sup.interval(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn loop_survives_failed_reconnects() {
    let (mut link, sim) = SimLink::new();
    link.connect().await.unwrap();
    sim.clear_calls();

    let cfg = ControlConfig::instant();
    let session = session::shared(VehicleSession::connected());
    let running = Arc::new(AtomicBool::new(true));
    let handle = SupervisionLoop::new(
        session::shared_link(Box::new(link)),
        session.clone(),
        &cfg,
        EventSink::discard(),
        running.clone(),
    )
    .spawn();

    // Lost after the 4th probe, then two failed reconnects before one lands.
    sim.fail_liveness(4);
    sim.fail_connects(2);
    tokio::time::sleep(Duration::from_secs(15)).await;

    assert_eq!(sim.count(&SimCall::Connect), 3);
    assert_eq!(lock(&session).connection, ConnectionState::Connected);
    assert_eq!(lock(&session).reconnect_failures, 0);
    assert!(!handle.is_finished());

    running.store(false, Ordering::SeqCst);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn link_dropped_by_the_vehicle_is_rebuilt() {
    let r = rig().await;
    r.sim.drop_link();

    for _ in 0..4 {
        r.sup.tick().await.unwrap();
    }
    assert_eq!(lock(&r.session).connection, ConnectionState::Disconnected);

    assert_eq!(r.sup.tick().await.unwrap(), Tick::Reconnected);
    assert_eq!(lock(&r.session).connection, ConnectionState::Connected);
}
