use std::time::Duration;
use tether_ctl::config::ControlConfig;
use tether_ctl::events::EventSink;
use tether_ctl::session::{self, lock, SharedLink, SharedSession, VehicleSession};
use tether_ctl::{CommandError, CommandExecutor, Intent, Outcome};
use tether_link::{Link, LinkError, SimCall, SimHandle, SimLink};
use tether_proto::command::{FlipDirection, MoveDirection, RotateDirection, Velocity};
use tether_proto::state::{CommandedState, ConnectionState};

async fn rig_with_link() -> (CommandExecutor, SharedLink, SharedSession, SimHandle) {
    let (mut link, sim) = SimLink::new();
    link.connect().await.unwrap();
    sim.clear_calls();

    let link = session::shared_link(Box::new(link));
    let session = session::shared(VehicleSession::connected());
    let exec = CommandExecutor::new(link.clone(), session.clone(), &ControlConfig::instant(), EventSink::discard());
    (exec, link, session, sim)
}

async fn rig() -> (CommandExecutor, SharedSession, SimHandle) {
    let (exec, _link, session, sim) = rig_with_link().await;
    (exec, session, sim)
}

async fn airborne_rig() -> (CommandExecutor, SharedSession, SimHandle) {
    let (exec, session, sim) = rig().await;
    assert_eq!(exec.execute(Intent::Takeoff).await.unwrap(), Outcome::TookOff { verified: true });
    sim.clear_calls();
    (exec, session, sim)
}

#[tokio::test(start_paused = true)]
async fn positioning_needs_takeoff_first() {
    let (exec, _session, sim) = rig().await;

    for direction in MoveDirection::ALL {
        let err = exec.execute(Intent::Move { direction, distance_cm: 50 }).await.unwrap_err();
        assert!(matches!(err, CommandError::Precondition(_)), "{direction}: {err}");
    }
    let err = exec
        .execute(Intent::Rotate { direction: RotateDirection::Clockwise, degrees: 90 })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "must take off first");
    assert!(exec.execute(Intent::Flip(FlipDirection::Back)).await.is_err());

    assert!(sim.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn takeoff_and_land_are_idempotent() {
    let (exec, session, sim) = rig().await;

    assert_eq!(exec.execute(Intent::Land).await.unwrap(), Outcome::AlreadyGrounded);
    assert_eq!(exec.execute(Intent::Takeoff).await.unwrap(), Outcome::TookOff { verified: true });
    assert_eq!(exec.execute(Intent::Takeoff).await.unwrap(), Outcome::AlreadyAirborne);
    assert_eq!(sim.count(&SimCall::Takeoff), 1);
    assert_eq!(lock(&session).commanded, CommandedState::Airborne);

    assert_eq!(exec.execute(Intent::Land).await.unwrap(), Outcome::Landed { verified: true });
    assert_eq!(exec.execute(Intent::Land).await.unwrap(), Outcome::AlreadyGrounded);
    assert_eq!(sim.count(&SimCall::Land), 1);
    assert_eq!(lock(&session).commanded, CommandedState::Grounded);
}

#[tokio::test(start_paused = true)]
async fn takeoff_queued_behind_a_liftoff_reconciliation_is_not_sent() {
    let (exec, link, session, sim) = rig_with_link().await;

    // A supervision tick holds the link and reconciles an unexpected liftoff
    // while the operator's takeoff waits for it.
    let tick = link.lock().await;
    let queued = tokio::spawn(async move { exec.execute(Intent::Takeoff).await });
    tokio::task::yield_now().await;
    lock(&session).commanded = CommandedState::Airborne;
    drop(tick);

    assert_eq!(queued.await.unwrap().unwrap(), Outcome::AlreadyAirborne);
    assert_eq!(sim.count(&SimCall::Takeoff), 0);
}

#[tokio::test(start_paused = true)]
async fn land_queued_behind_a_crash_reconciliation_is_not_sent() {
    let (exec, link, session, sim) = rig_with_link().await;
    exec.execute(Intent::Takeoff).await.unwrap();

    let tick = link.lock().await;
    let queued = tokio::spawn(async move { exec.execute(Intent::Land).await });
    tokio::task::yield_now().await;
    lock(&session).commanded = CommandedState::Grounded;
    drop(tick);

    assert_eq!(queued.await.unwrap().unwrap(), Outcome::AlreadyGrounded);
    assert_eq!(sim.count(&SimCall::Land), 0);
}

#[tokio::test(start_paused = true)]
async fn takeoff_after_a_resync_that_finds_the_vehicle_flying_is_not_sent() {
    let (exec, session, sim) = rig().await;
    lock(&session).connection = ConnectionState::Disconnected;
    sim.script_heights([45]);

    assert_eq!(exec.execute(Intent::Takeoff).await.unwrap(), Outcome::AlreadyAirborne);
    assert_eq!(sim.count(&SimCall::Connect), 1);
    assert_eq!(sim.count(&SimCall::Takeoff), 0);
}

#[tokio::test(start_paused = true)]
async fn arguments_are_clamped_before_dispatch() {
    let (exec, _session, sim) = airborne_rig().await;

    let out = exec.execute(Intent::Move { direction: MoveDirection::Forward, distance_cm: 1000 }).await.unwrap();
    assert_eq!(out, Outcome::Moved { direction: MoveDirection::Forward, distance_cm: 500, fallback: false });

    let out = exec.execute(Intent::Move { direction: MoveDirection::Up, distance_cm: 5 }).await.unwrap();
    assert_eq!(out, Outcome::Moved { direction: MoveDirection::Up, distance_cm: 20, fallback: false });

    let out = exec.execute(Intent::Rotate { direction: RotateDirection::CounterClockwise, degrees: 0 }).await.unwrap();
    assert_eq!(out, Outcome::Rotated { direction: RotateDirection::CounterClockwise, degrees: 1 });

    assert_eq!(
        sim.calls(),
        vec![
            SimCall::Move(MoveDirection::Forward, 500),
            SimCall::Move(MoveDirection::Up, 20),
            SimCall::Rotate(RotateDirection::CounterClockwise, 1),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn attitude_fault_falls_back_to_velocity() {
    let (exec, _session, sim) = airborne_rig().await;
    sim.set_move_fault(Some("No valid imu"));

    let start = tokio::time::Instant::now();
    let out = exec.execute(Intent::Move { direction: MoveDirection::Forward, distance_cm: 50 }).await.unwrap();

    assert_eq!(out, Outcome::Moved { direction: MoveDirection::Forward, distance_cm: 50, fallback: true });
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(
        sim.calls(),
        vec![
            SimCall::Move(MoveDirection::Forward, 50),
            SimCall::Velocity(Velocity { lr: 0, fb: 50, ud: 0, yaw: 0 }),
            SimCall::Velocity(Velocity::STOP),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn fallback_speed_has_a_floor() {
    let (exec, _session, sim) = airborne_rig().await;
    sim.set_move_fault(Some("error No valid imu"));

    let start = tokio::time::Instant::now();
    exec.execute(Intent::Move { direction: MoveDirection::Left, distance_cm: 20 }).await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(400));
    assert_eq!(sim.count(&SimCall::Velocity(MoveDirection::Left.velocity(20))), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_is_sent_even_when_fallback_fails() {
    let (exec, _session, sim) = airborne_rig().await;
    sim.set_move_fault(Some("No valid imu"));
    sim.set_velocity_fault(true);

    let err = exec.execute(Intent::Move { direction: MoveDirection::Back, distance_cm: 100 }).await.unwrap_err();
    assert!(matches!(err, CommandError::Transport(LinkError::Transport(_))));
    assert_eq!(sim.count(&SimCall::Velocity(Velocity::STOP)), 1);
}

#[tokio::test(start_paused = true)]
async fn other_rejections_are_reported_without_fallback() {
    let (exec, _session, sim) = airborne_rig().await;
    sim.set_move_fault(Some("out of range"));

    let err = exec.execute(Intent::Move { direction: MoveDirection::Right, distance_cm: 80 }).await.unwrap_err();
    assert!(matches!(err, CommandError::Transport(LinkError::Rejected { .. })));
    assert!(!sim.calls().iter().any(|c| matches!(c, SimCall::Velocity(_))));
}

#[tokio::test(start_paused = true)]
async fn rc_holds_then_stops() {
    let (exec, _session, sim) = airborne_rig().await;

    let out = exec.execute(Intent::Rc { direction: MoveDirection::Up, speed: 500, secs: 9.0 }).await.unwrap();
    assert_eq!(
        out,
        Outcome::Drove { velocity: MoveDirection::Up.velocity(100), duration: Duration::from_secs(5) }
    );
    assert_eq!(
        sim.calls(),
        vec![SimCall::Velocity(MoveDirection::Up.velocity(100)), SimCall::Velocity(Velocity::STOP)]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_gate_reconnect_is_link_unavailable() {
    let (exec, session, sim) = airborne_rig().await;
    lock(&session).connection = ConnectionState::Disconnected;
    sim.fail_connects(1);

    let err = exec.execute(Intent::Move { direction: MoveDirection::Forward, distance_cm: 50 }).await.unwrap_err();
    assert!(matches!(err, CommandError::LinkUnavailable(_)));
    assert_eq!(sim.calls(), vec![SimCall::Disconnect, SimCall::Connect]);
    assert_eq!(lock(&session).reconnect_failures, 1);
    assert_eq!(lock(&session).commanded, CommandedState::Airborne);

    // Next try reconnects, resyncs and goes through.
    sim.clear_calls();
    exec.execute(Intent::Move { direction: MoveDirection::Forward, distance_cm: 50 }).await.unwrap();
    assert_eq!(sim.calls().last(), Some(&SimCall::Move(MoveDirection::Forward, 50)));
    assert_eq!(lock(&session).connection, ConnectionState::Connected);
    assert_eq!(lock(&session).reconnect_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn gate_resync_catches_auto_landing() {
    let (exec, session, sim) = airborne_rig().await;
    lock(&session).connection = ConnectionState::Disconnected;
    sim.auto_land();

    let err = exec.execute(Intent::Move { direction: MoveDirection::Forward, distance_cm: 50 }).await.unwrap_err();
    assert!(matches!(err, CommandError::Precondition(_)));
    assert_eq!(lock(&session).commanded, CommandedState::Grounded);
    assert!(!sim.calls().iter().any(|c| matches!(c, SimCall::Move(..))));
}

#[tokio::test(start_paused = true)]
async fn emergency_grounds_the_session() {
    let (exec, session, sim) = airborne_rig().await;
    assert_eq!(exec.execute(Intent::Emergency).await.unwrap(), Outcome::EmergencyStopped);
    assert_eq!(lock(&session).commanded, CommandedState::Grounded);
    assert!(!sim.is_airborne());
}

#[tokio::test(start_paused = true)]
async fn status_reads_link_only_while_reachable() {
    let (exec, session, sim) = rig().await;

    let Outcome::Status(snap) = exec.execute(Intent::Status).await.unwrap() else {
        panic!("expected status");
    };
    assert_eq!(snap.battery_pct, Some(87));
    assert_eq!(snap.temperature_f, Some(147));
    assert_eq!(snap.connection, ConnectionState::Connected);
    assert!(snap.last_contact_ms.is_some());

    lock(&session).connection = ConnectionState::Disconnected;
    sim.clear_calls();
    let snap = exec.status().await;
    assert_eq!(snap.battery_pct, None);
    assert_eq!(snap.connection, ConnectionState::Disconnected);
    assert!(sim.calls().is_empty());
}
