use async_trait::async_trait;
use tether_proto::command::{FlipDirection, MoveDirection, RotateDirection, Velocity};
use tether_proto::telemetry::Attitude;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::{Link, LinkConfig, LinkError, LinkResult};

/// Tello SDK text protocol over UDP. Every command is one datagram and,
/// except for `rc`, is answered by one datagram.
pub struct SdkLink {
    cfg: LinkConfig,
    sock: Option<UdpSocket>,
}

impl SdkLink {
    pub fn new(cfg: LinkConfig) -> Self {
        Self { cfg, sock: None }
    }

    fn sock(&self) -> LinkResult<&UdpSocket> {
        self.sock.as_ref().ok_or(LinkError::NotConnected)
    }

    async fn send_only(&self, cmd: &str) -> LinkResult<()> {
        self.sock()?.send(cmd.as_bytes()).await?;
        Ok(())
    }

    async fn request(&self, cmd: &str) -> LinkResult<String> {
        let sock = self.sock()?;
        drain_stale(sock);
        sock.send(cmd.as_bytes()).await?;

        let mut buf = [0u8; 1024];
        let n = match tokio::time::timeout(self.cfg.response_timeout(), sock.recv(&mut buf)).await {
            Ok(r) => r?,
            Err(_) => return Err(LinkError::Timeout(cmd.to_string())),
        };
        let reply = String::from_utf8_lossy(&buf[..n]).trim().to_string();
        debug!(cmd, reply = %reply, "sdk reply");

        if let Some(reason) = reply.strip_prefix("error") {
            let reason = reason.trim();
            return Err(LinkError::Rejected {
                command: cmd.to_string(),
                reason: if reason.is_empty() { "error".into() } else { reason.to_string() },
            });
        }
        Ok(reply)
    }

    async fn action(&self, cmd: &str) -> LinkResult<()> {
        let reply = self.request(cmd).await?;
        if reply.eq_ignore_ascii_case("ok") {
            Ok(())
        } else {
            Err(LinkError::Malformed { command: cmd.to_string(), reply })
        }
    }

    async fn query<T>(&self, cmd: &str, parse: fn(&str) -> Option<T>) -> LinkResult<T> {
        let reply = self.request(cmd).await?;
        parse(&reply).ok_or(LinkError::Malformed { command: cmd.to_string(), reply })
    }
}

/// Late replies to earlier timed-out requests would otherwise be read as
/// the answer to the next one.
fn drain_stale(sock: &UdpSocket) {
    let mut buf = [0u8; 1024];
    while let Ok(n) = sock.try_recv(&mut buf) {
        debug!(stale = %String::from_utf8_lossy(&buf[..n]).trim(), "sdk: dropped stale reply");
    }
}

#[async_trait]
impl Link for SdkLink {
    async fn connect(&mut self) -> LinkResult<()> {
        let target = self.cfg.target();
        let sock = UdpSocket::bind(("0.0.0.0", self.cfg.local_port)).await?;
        sock.connect(&target).await?;
        self.sock = Some(sock);

        if let Err(e) = self.action("command").await {
            warn!("sdk: {} did not enter SDK mode: {}", target, e);
            self.sock = None;
            return Err(e);
        }
        info!("sdk: connected to {}", target);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.sock.take().is_some() {
            info!("sdk: closed link to {}", self.cfg.target());
        }
    }

    async fn takeoff(&mut self) -> LinkResult<()> {
        self.action("takeoff").await
    }

    async fn land(&mut self) -> LinkResult<()> {
        self.action("land").await
    }

    async fn emergency_stop(&mut self) -> LinkResult<()> {
        self.action("emergency").await
    }

    async fn move_by(&mut self, dir: MoveDirection, cm: u32) -> LinkResult<()> {
        self.action(&format!("{} {}", dir.name(), cm)).await
    }

    async fn rotate(&mut self, dir: RotateDirection, degrees: u32) -> LinkResult<()> {
        self.action(&format!("{} {}", dir.name(), degrees)).await
    }

    async fn flip(&mut self, dir: FlipDirection) -> LinkResult<()> {
        self.action(&format!("flip {}", dir.letter())).await
    }

    async fn set_velocity(&mut self, v: Velocity) -> LinkResult<()> {
        self.send_only(&format!("rc {} {} {} {}", v.lr, v.fb, v.ud, v.yaw)).await
    }

    async fn battery(&mut self) -> LinkResult<i32> {
        self.query("battery?", parse_number).await
    }

    async fn height(&mut self) -> LinkResult<i32> {
        self.query("height?", parse_height_cm).await
    }

    async fn temperature(&mut self) -> LinkResult<i32> {
        self.query("temp?", parse_temperature_c).await
    }

    async fn attitude(&mut self) -> LinkResult<Attitude> {
        self.query("attitude?", parse_attitude).await
    }

    async fn speed(&mut self) -> LinkResult<i32> {
        self.query("speed?", parse_number).await
    }
}

// ----- Reply parsing -----

fn parse_number(s: &str) -> Option<i32> {
    let v: f32 = s.trim().parse().ok()?;
    Some(v.round() as i32)
}

// "12dm", "120cm" or a bare centimetre count
fn parse_height_cm(s: &str) -> Option<i32> {
    let s = s.trim();
    if let Some(dm) = s.strip_suffix("dm") {
        return parse_number(dm).map(|v| v * 10);
    }
    parse_number(s.strip_suffix("cm").unwrap_or(s))
}

// "62~65C" (low~high) or "64C"
fn parse_temperature_c(s: &str) -> Option<i32> {
    let s = s.trim().trim_end_matches(['C', 'c']);
    match s.split_once('~') {
        Some((lo, hi)) => Some((parse_number(lo)? + parse_number(hi)?) / 2),
        None => parse_number(s),
    }
}

// "pitch:0;roll:-1;yaw:12;"
fn parse_attitude(s: &str) -> Option<Attitude> {
    let (mut pitch, mut roll, mut yaw) = (None, None, None);
    for field in s.trim().split(';').filter(|f| !f.is_empty()) {
        let (k, v) = field.split_once(':')?;
        let v = parse_number(v)?;
        match k.trim() {
            "pitch" => pitch = Some(v),
            "roll" => roll = Some(v),
            "yaw" => yaw = Some(v),
            _ => {}
        }
    }
    Some(Attitude { pitch: pitch?, roll: roll?, yaw: yaw? })
}
