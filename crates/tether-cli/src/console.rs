use anyhow::{Context, Result};
use tether_ctl::{Controller, Outcome};
use tether_proto::telemetry::FlightEvent;
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tracing::info;

const HELP: &str = "\
commands:
  takeoff | land | emergency | reconnect
  forward|back|left|right|up|down [cm]   (20-500, default 50)
  cw|ccw [deg]  rotate [deg] [cw]        (1-360, default 90)
  flip [f|b|l|r]
  rc <direction> [speed] [seconds]       (10-100, 0.1-5.0s)
  status | battery | help | quit";

/// Operator console on stdin/stdout.
pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for Console {
    fn default() -> Self {
        Self { lines: BufReader::new(tokio::io::stdin()).lines() }
    }
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    async fn prompt(&self, text: &str) -> Result<()> {
        let mut out = tokio::io::stdout();
        out.write_all(text.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }

    pub async fn confirm(&mut self, question: &str) -> Result<bool> {
        self.prompt(&format!("{} [y/N] ", question)).await?;
        let answer = self.lines.next_line().await.context("read stdin")?;
        Ok(matches!(answer.as_deref().map(str::trim), Some("y" | "Y" | "yes")))
    }

    /// Reads and dispatches lines until quit, end of input or Ctrl-C.
    pub async fn run(&mut self, ctl: &Controller) -> Result<()> {
        println!("{}", HELP);
        while ctl.is_running() {
            self.prompt("tether> ").await?;
            let line = tokio::select! {
                line = self.lines.next_line() => line.context("read stdin")?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    info!("console: interrupted");
                    break;
                }
            };
            let Some(line) = line else {
                info!("console: end of input");
                break;
            };

            match ctl.dispatch(&line).await {
                Ok(None) => {}
                Ok(Some(Outcome::Help)) => println!("{}", HELP),
                Ok(Some(Outcome::Quit)) => break,
                Ok(Some(out)) => println!("{}", out),
                Err(e) => println!("error: {}", e),
            }
        }
        Ok(())
    }
}

/// Prints supervision events as they arrive. Ends when the controller is
/// gone and the channel closes.
pub async fn print_events(mut rx: mpsc::Receiver<FlightEvent>) {
    while let Some(ev) = rx.recv().await {
        let t = OffsetDateTime::now_utc().time();
        let mark = if ev.is_reconciliation() { "!!" } else { "--" };
        println!("\n{} [{:02}:{:02}:{:02}] {}", mark, t.hour(), t.minute(), t.second(), ev);
    }
}
