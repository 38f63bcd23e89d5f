//! motorlink: headless monitor and console for the motor driver link
//!
//! Keeps the link supervised on a background thread, drives the liveness
//! check and status display from a tokio scheduler, and accepts operator
//! commands on stdin.

mod operator;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use motorlink_core::config::MonitorConfig;
use motorlink_core::control::{MotorController, RunState, StatusReport};
use motorlink_core::demo::{DemoDevice, DemoHandle, DEMO_TICK};
use motorlink_core::liveness::ConnectivityState;
use motorlink_core::monitor::Monitor;
use motorlink_core::protocol::{
    list_ports, Connector, LinkState, MemoryPort, Mode, SerialConnector,
};

use operator::{OperatorCommand, HELP};

#[derive(Parser, Debug)]
#[command(name = "motorlink", version, about = "Motor driver serial link monitor")]
struct Cli {
    /// Serial port to open (overrides the config file)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate (overrides the config file)
    #[arg(short, long)]
    baud: Option<u32>,

    /// Config file (defaults to the per-user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Talk to a simulated device instead of a serial port
    #[arg(long)]
    demo: bool,

    /// Print status reports as JSON lines
    #[arg(long)]
    json: bool,

    /// Print a full status line at least this often, in milliseconds
    #[arg(long, default_value_t = 1000)]
    status_every: u64,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<MonitorConfig> {
    let mut config = match cli.config.clone().or_else(MonitorConfig::default_path) {
        Some(path) => MonitorConfig::load_or_default(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MonitorConfig::default(),
    };
    if let Some(port) = &cli.port {
        config.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    Ok(config)
}

fn print_ports() {
    let ports = list_ports();
    if ports.is_empty() {
        println!("no serial ports found");
        return;
    }
    for port in ports {
        let ids = match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => format!("  [{vid:04x}:{pid:04x}]"),
            _ => String::new(),
        };
        let label = port.product.or(port.manufacturer).unwrap_or_default();
        println!("{}{}  {}", port.name, ids, label);
    }
}

/// tokio intervals reject a zero period
fn every(period: Duration) -> tokio::time::Interval {
    tokio::time::interval(period.max(Duration::from_millis(1)))
}

fn render(report: &StatusReport) -> String {
    let telemetry = match &report.sample {
        Some(s) => format!(
            "L {:.0} mm/s  R {:.0} mm/s  dist {:.0} mm  ({} ms ago)",
            s.left_speed, s.right_speed, s.distance, s.age_ms
        ),
        None => "no telemetry".to_string(),
    };
    format!(
        "[{:?}/{:?}] mode {}  {:?} {}  {}",
        report.link, report.connectivity, report.mode, report.run_state, report.elapsed, telemetry
    )
}

fn format_status(report: &StatusReport, json: bool) -> String {
    if !json {
        return render(report);
    }
    serde_json::to_string(report).unwrap_or_else(|e| {
        tracing::warn!("failed to serialize status: {}", e);
        render(report)
    })
}

type Headline = (LinkState, ConnectivityState, Mode, RunState);

/// Decides when the display prints: on any headline change, otherwise
/// once per `period`
#[derive(Debug)]
struct StatusGate {
    period: Duration,
    last_headline: Option<Headline>,
    last_print: Option<Instant>,
}

impl StatusGate {
    fn new(period: Duration) -> Self {
        Self {
            period,
            last_headline: None,
            last_print: None,
        }
    }

    fn should_print(&mut self, report: &StatusReport, now: Instant) -> bool {
        let headline = (report.link, report.connectivity, report.mode, report.run_state);
        let due = self
            .last_print
            .map_or(true, |at| now.saturating_duration_since(at) >= self.period);
        if self.last_headline != Some(headline) || due {
            self.last_headline = Some(headline);
            self.last_print = Some(now);
            return true;
        }
        false
    }
}

/// Periodic liveness evaluation; transitions are logged by the monitor
fn spawn_liveness(controller: &MotorController) -> JoinHandle<()> {
    let liveness = controller.liveness().clone();
    tokio::spawn(async move {
        let mut ticker = every(liveness.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            liveness.check(Instant::now());
        }
    })
}

fn spawn_display(
    controller: MotorController,
    tick: Duration,
    status_every: Duration,
    json: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = every(tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut gate = StatusGate::new(status_every);
        loop {
            ticker.tick().await;
            let report = controller.status();
            if gate.should_print(&report, Instant::now()) {
                println!("{}", format_status(&report, json));
            }
        }
    })
}

/// What the console shows after a command
#[derive(Debug, Clone, PartialEq)]
enum Reply {
    Quit,
    Say(String),
    Silent,
}

/// Run one operator command
async fn execute(
    command: OperatorCommand,
    controller: &MotorController,
    demo: Option<&DemoHandle>,
    json: bool,
) -> Reply {
    let blocking = controller.clone();
    // Writes are bounded by the port timeout but still block
    let outcome = match command {
        OperatorCommand::Quit => return Reply::Quit,
        OperatorCommand::Help => return Reply::Say(HELP.to_string()),
        OperatorCommand::Status => return Reply::Say(format_status(&controller.status(), json)),
        OperatorCommand::Pause(_) | OperatorCommand::Plug(_) if demo.is_none() => {
            return Reply::Say("only available with --demo".to_string());
        }
        OperatorCommand::Pause(paused) => {
            if let Some(demo) = demo {
                demo.set_paused(paused);
            }
            let state = if paused { "paused" } else { "resumed" };
            return Reply::Say(format!("demo device {state}"));
        }
        OperatorCommand::Plug(plugged) => {
            if let Some(demo) = demo {
                if plugged {
                    demo.port().plug_in();
                } else {
                    demo.port().unplug();
                }
            }
            let state = if plugged { "plugged in" } else { "unplugged" };
            return Reply::Say(format!("virtual cable {state}"));
        }
        OperatorCommand::SwitchMode(mode) => {
            tokio::task::spawn_blocking(move || blocking.issue_mode_switch(mode).map(|_| None))
                .await
        }
        OperatorCommand::Start | OperatorCommand::Stop | OperatorCommand::Toggle => {
            let current = controller.run_state();
            let already = matches!(
                (&command, current),
                (OperatorCommand::Start, RunState::Running) | (OperatorCommand::Stop, RunState::Idle)
            );
            if already {
                return Reply::Say(format!("already {current:?}"));
            }
            tokio::task::spawn_blocking(move || blocking.issue_start_stop().map(Some)).await
        }
        OperatorCommand::Setpoint(channel, text) => {
            tokio::task::spawn_blocking(move || {
                blocking.issue_setpoint_text(channel, &text).map(|_| None)
            })
            .await
        }
    };

    match outcome {
        Ok(Ok(Some(state))) => Reply::Say(format!("run state: {state:?}")),
        Ok(Ok(None)) => Reply::Silent,
        Ok(Err(e)) => Reply::Say(format!("command failed: {e}")),
        Err(e) => {
            tracing::error!("command task failed: {}", e);
            Reply::Silent
        }
    }
}

async fn console(controller: MotorController, demo: Option<&DemoHandle>, json: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match OperatorCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e} (try 'help')");
                continue;
            }
        };
        match execute(command, &controller, demo, json).await {
            Reply::Quit => break,
            Reply::Say(text) => println!("{text}"),
            Reply::Silent => {}
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.list_ports {
        print_ports();
        return Ok(());
    }

    let config = load_config(&cli)?;

    let (connector, demo): (Box<dyn Connector>, Option<DemoHandle>) = if cli.demo {
        let port = MemoryPort::new();
        let device = DemoDevice::new()
            .spawn(port.clone(), DEMO_TICK)
            .context("starting demo device")?;
        tracing::info!("demo mode: simulated motor driver");
        (Box::new(port.connector()), Some(device))
    } else {
        tracing::info!("using port {} at {} baud", config.port, config.baud_rate);
        (Box::new(SerialConnector), None)
    };

    let monitor = Monitor::start(&config, connector).context("starting link supervisor")?;
    let controller = monitor.controller().clone();

    let liveness_task = spawn_liveness(&controller);
    let display_task = spawn_display(
        controller.clone(),
        config.display_interval(),
        Duration::from_millis(cli.status_every),
        cli.json,
    );

    if !cli.json {
        println!("{HELP}");
    }

    tokio::select! {
        result = console(controller, demo.as_ref(), cli.json) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
    }

    liveness_task.abort();
    display_task.abort();

    tokio::task::spawn_blocking(move || {
        monitor.shutdown();
        if let Some(demo) = demo {
            demo.shutdown();
        }
    })
    .await
    .context("shutting down")?;

    tracing::info!("link closed");
    Ok(())
}
