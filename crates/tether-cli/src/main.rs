use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use tether_ctl::events::EventSink;
use tether_ctl::{ControlConfig, Controller, Intent, Outcome};
use tether_link::{Link, LinkConfig, SdkLink, SimLink};

mod console;

#[derive(Debug, Parser)]
#[command(name = "tether", version, about = "SKYtether - quadcopter ground station with silent-crash recovery")]
struct Cli {
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration.
    Doctor,
    /// Connect and fly from the interactive console.
    Run {
        /// Fly the in-memory vehicle instead of the real one.
        #[arg(long)]
        sim: bool,
        /// Simulated packet loss, 0.0..1.0 (with --sim).
        #[arg(long, default_value_t = 0.0)]
        loss: f64,
        /// Do not ask for confirmation on low battery.
        #[arg(long)]
        yes: bool,
    },
    /// Connect, print one status snapshot and disconnect.
    Status {
        #[arg(long)]
        sim: bool,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Config {
    link: LinkConfig,
    control: ControlConfig,
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let s = std::fs::read_to_string(path).context("read config")?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Run { sim, loss, yes } => run(&cfg, sim, loss, yes).await?,
        Command::Status { sim, json } => status(&cfg, sim, json).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    tether_link::doctor::check_link(&cfg.link)?;
    tether_ctl::doctor::check_control(&cfg.control)?;
    info!("doctor: OK");
    println!("config OK");
    Ok(())
}

fn open_link(cfg: &LinkConfig, sim: bool, loss: f64) -> Box<dyn Link> {
    if sim {
        let (link, handle) = SimLink::new();
        handle.set_loss_rate(loss);
        info!(loss, "link: simulated vehicle");
        return Box::new(link);
    }
    info!("link: vehicle at {}", cfg.target());
    Box::new(SdkLink::new(cfg.clone()))
}

async fn run(cfg: &Config, sim: bool, loss: f64, yes: bool) -> Result<()> {
    info!("run: starting");
    anyhow::ensure!((0.0..=1.0).contains(&loss), "--loss must be within 0.0..1.0");

    let (sink, events) = EventSink::channel(64);
    let mut ctl = Controller::connect(open_link(&cfg.link, sim, loss), cfg.control.clone(), sink)
        .await
        .context("connect to vehicle")?;
    println!("connected");

    let mut console = console::Console::new();
    match ctl.executor().execute(Intent::Battery).await {
        Ok(Outcome::Battery(pct)) => {
            println!("battery: {}%", pct);
            if pct < cfg.control.commands.low_battery_pct {
                println!("WARNING: low battery ({}%)", pct);
                if !yes && !console.confirm("continue anyway?").await? {
                    ctl.shutdown().await?;
                    return Ok(());
                }
            }
        }
        Ok(other) => warn!("unexpected battery reply: {:?}", other),
        Err(e) => warn!("battery check failed: {}", e),
    }

    ctl.start_supervision();
    let printer = tokio::spawn(console::print_events(events));

    console.run(&ctl).await?;

    println!("shutting down...");
    let res = ctl.shutdown().await;
    if let Err(e) = printer.await {
        warn!("event printer ended abnormally: {}", e);
    }
    match res {
        Ok(()) => {
            println!("disconnected");
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            println!("WARNING: {}; vehicle failsafe will take over", e);
            Err(e.into())
        }
    }
}

async fn status(cfg: &Config, sim: bool, json: bool) -> Result<()> {
    let ctl = Controller::connect(open_link(&cfg.link, sim, 0.0), cfg.control.clone(), EventSink::discard())
        .await
        .context("connect to vehicle")?;
    let snap = ctl.executor().status().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
    } else {
        println!("{}", snap);
    }
    ctl.shutdown().await?;
    Ok(())
}
