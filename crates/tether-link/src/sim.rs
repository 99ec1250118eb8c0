//! In-memory vehicle behind the [`Link`] trait.
//!
//! [`SimLink`] is handed to the controller; the paired [`SimHandle`] stays
//! with the caller to script telemetry, inject faults and inspect the calls
//! the controller made.

use async_trait::async_trait;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tether_proto::command::{FlipDirection, MoveDirection, RotateDirection, Velocity};
use tether_proto::telemetry::Attitude;
use tracing::debug;

use crate::{Link, LinkError, LinkResult};

/// Height the simulated vehicle settles at after takeoff.
pub const HOVER_HEIGHT_CM: i32 = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    Connect,
    Disconnect,
    Takeoff,
    Land,
    Emergency,
    Move(MoveDirection, u32),
    Rotate(RotateDirection, u32),
    Flip(FlipDirection),
    Velocity(Velocity),
    Battery,
    Height,
    Temperature,
    Attitude,
    Speed,
}

#[derive(Debug)]
struct SimState {
    connected: bool,
    airborne: bool,
    height_cm: i32,
    battery_pct: i32,
    temperature_c: i32,
    yaw: i32,

    scripted_heights: VecDeque<i32>,
    liveness_failures: u32,
    connect_failures: u32,
    move_fault: Option<String>,
    velocity_fault: bool,
    loss_rate: f64,

    calls: Vec<SimCall>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            connected: false,
            airborne: false,
            height_cm: 0,
            battery_pct: 87,
            temperature_c: 64,
            yaw: 0,
            scripted_heights: VecDeque::new(),
            liveness_failures: 0,
            connect_failures: 0,
            move_fault: None,
            velocity_fault: false,
            loss_rate: 0.0,
            calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimHandle(Arc<Mutex<SimState>>);

impl SimHandle {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Heights returned by the next `height()` calls, in order, before the
    /// model height takes over again.
    pub fn script_heights<I: IntoIterator<Item = i32>>(&self, heights: I) {
        self.state().scripted_heights.extend(heights);
    }

    /// The next `n` battery reads time out.
    pub fn fail_liveness(&self, n: u32) {
        self.state().liveness_failures = n;
    }

    pub fn fail_connects(&self, n: u32) {
        self.state().connect_failures = n;
    }

    /// Positioning commands fail with this vehicle error until cleared.
    pub fn set_move_fault(&self, reason: Option<&str>) {
        self.state().move_fault = reason.map(str::to_string);
    }

    pub fn set_velocity_fault(&self, fail: bool) {
        self.state().velocity_fault = fail;
    }

    pub fn set_battery(&self, pct: i32) {
        self.state().battery_pct = pct;
    }

    /// Probability that any request is lost on the air.
    pub fn set_loss_rate(&self, rate: f64) {
        self.state().loss_rate = rate.clamp(0.0, 1.0);
    }

    /// Puts the vehicle on the ground without telling the controller, as the
    /// vehicle does by itself after losing the link.
    pub fn auto_land(&self) {
        let mut st = self.state();
        st.airborne = false;
        st.height_cm = 0;
    }

    /// Drops the link from the vehicle side.
    pub fn drop_link(&self) {
        self.state().connected = false;
    }

    pub fn is_airborne(&self) -> bool {
        self.state().airborne
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn count(&self, call: &SimCall) -> usize {
        self.state().calls.iter().filter(|c| *c == call).count()
    }
}

pub struct SimLink {
    handle: SimHandle,
}

impl SimLink {
    pub fn new() -> (SimLink, SimHandle) {
        let handle = SimHandle::default();
        (SimLink { handle: handle.clone() }, handle)
    }

    /// Records the call, then applies connection state and packet loss.
    fn enter(&self, call: SimCall, what: &str) -> LinkResult<MutexGuard<'_, SimState>> {
        let mut st = self.handle.state();
        debug!(?call, "sim call");
        st.calls.push(call);
        if !st.connected {
            return Err(LinkError::NotConnected);
        }
        if st.loss_rate > 0.0 && rand::thread_rng().gen_bool(st.loss_rate) {
            return Err(LinkError::Timeout(what.to_string()));
        }
        Ok(st)
    }

    fn positioning(&self, call: SimCall, what: &str) -> LinkResult<MutexGuard<'_, SimState>> {
        let st = self.enter(call, what)?;
        if !st.airborne {
            return Err(LinkError::Rejected { command: what.into(), reason: "Not joystick".into() });
        }
        if let Some(reason) = st.move_fault.clone() {
            return Err(LinkError::Rejected { command: what.into(), reason });
        }
        Ok(st)
    }
}

#[async_trait]
impl Link for SimLink {
    async fn connect(&mut self) -> LinkResult<()> {
        let mut st = self.handle.state();
        st.calls.push(SimCall::Connect);
        if st.connect_failures > 0 {
            st.connect_failures -= 1;
            return Err(LinkError::Timeout("command".into()));
        }
        st.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        let mut st = self.handle.state();
        st.calls.push(SimCall::Disconnect);
        st.connected = false;
    }

    async fn takeoff(&mut self) -> LinkResult<()> {
        let mut st = self.enter(SimCall::Takeoff, "takeoff")?;
        st.airborne = true;
        st.height_cm = HOVER_HEIGHT_CM;
        Ok(())
    }

    async fn land(&mut self) -> LinkResult<()> {
        let mut st = self.enter(SimCall::Land, "land")?;
        st.airborne = false;
        st.height_cm = 0;
        Ok(())
    }

    async fn emergency_stop(&mut self) -> LinkResult<()> {
        let mut st = self.enter(SimCall::Emergency, "emergency")?;
        st.airborne = false;
        st.height_cm = 0;
        Ok(())
    }

    async fn move_by(&mut self, dir: MoveDirection, cm: u32) -> LinkResult<()> {
        let what = format!("{} {}", dir.name(), cm);
        let mut st = self.positioning(SimCall::Move(dir, cm), &what)?;
        let cm = cm as i32;
        match dir {
            MoveDirection::Up => st.height_cm += cm,
            MoveDirection::Down => st.height_cm = (st.height_cm - cm).max(20),
            _ => {}
        }
        Ok(())
    }

    async fn rotate(&mut self, dir: RotateDirection, degrees: u32) -> LinkResult<()> {
        let what = format!("{} {}", dir.name(), degrees);
        let mut st = self.positioning(SimCall::Rotate(dir, degrees), &what)?;
        let d = degrees as i32;
        st.yaw = match dir {
            RotateDirection::Clockwise => (st.yaw + d).rem_euclid(360),
            RotateDirection::CounterClockwise => (st.yaw - d).rem_euclid(360),
        };
        Ok(())
    }

    async fn flip(&mut self, dir: FlipDirection) -> LinkResult<()> {
        let what = format!("flip {}", dir.letter());
        self.positioning(SimCall::Flip(dir), &what)?;
        Ok(())
    }

    async fn set_velocity(&mut self, v: Velocity) -> LinkResult<()> {
        let st = self.enter(SimCall::Velocity(v), "rc")?;
        if st.velocity_fault {
            return Err(LinkError::Transport("rc datagram not sent".into()));
        }
        Ok(())
    }

    async fn battery(&mut self) -> LinkResult<i32> {
        let mut st = self.enter(SimCall::Battery, "battery?")?;
        if st.liveness_failures > 0 {
            st.liveness_failures -= 1;
            return Err(LinkError::Timeout("battery?".into()));
        }
        Ok(st.battery_pct)
    }

    async fn height(&mut self) -> LinkResult<i32> {
        let mut st = self.enter(SimCall::Height, "height?")?;
        Ok(match st.scripted_heights.pop_front() {
            Some(h) => h,
            None => st.height_cm,
        })
    }

    async fn temperature(&mut self) -> LinkResult<i32> {
        let st = self.enter(SimCall::Temperature, "temp?")?;
        Ok(st.temperature_c)
    }

    async fn attitude(&mut self) -> LinkResult<Attitude> {
        let st = self.enter(SimCall::Attitude, "attitude?")?;
        Ok(Attitude { pitch: 0, roll: 0, yaw: st.yaw })
    }

    async fn speed(&mut self) -> LinkResult<i32> {
        self.enter(SimCall::Speed, "speed?")?;
        Ok(100)
    }
}
