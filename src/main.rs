//! Dispenser host binary.
//!
//! ```text
//!  stdin ──▶ DispenseCommand ──▶ PourEngine ──▶ Pumps ──▶ HardwareLink ──▶ adapter
//!                                    │                         ▲
//!                               ExecutorTimer          AdapterListener
//! ```
//!
//! `simulate` pours once against an in-process board; `serve` waits for the
//! native adapter to connect and pours whatever is typed on stdin.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};

use dispenser::adapters::adapter_listener::AdapterListener;
use dispenser::adapters::assignments::AssignmentResolver;
use dispenser::adapters::executor_timer::ExecutorTimer;
use dispenser::adapters::log_sink::LogEventSink;
use dispenser::adapters::manual_timer::ManualTimer;
use dispenser::adapters::sim_board::SimBoard;
use dispenser::app::commands::DispenseCommand;
use dispenser::app::ports::TimerService;
use dispenser::app::service::PourEngine;
use dispenser::brandset::Brandset;
use dispenser::config::DispenserConfig;
use dispenser::drivers::board::Board;
use dispenser::link::{HardwareLink, hardware_link};
use dispenser::task::{PourFuture, PourOutcome};

/// Catalog used when no `--brandset` is given.
const DEMO_BRANDSET: &str = include_str!("../demos/brandset.json");

#[derive(Parser, Debug)]
#[command(name = "dispenser", version, about = "Beverage dispenser pour core")]
struct Cli {
    /// Dispenser configuration (JSON). Stock board and assignments when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Beverage catalog (JSON). Built-in demo catalog when omitted.
    #[arg(long, global = true)]
    brandset: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pour one beverage on the in-process simulated board
    Simulate {
        beverage: String,
        /// Volume in ml
        volume: f64,
        /// Wait for the pumps in real time instead of fast-forwarding
        #[arg(long)]
        realtime: bool,
    },
    /// Wait for the native adapter and pour beverages read from stdin
    Serve {
        /// Listen address, overriding `link.listen_addr`
        #[arg(long)]
        listen: Option<String>,
    },
}

type Engine = PourEngine<AssignmentResolver, LogEventSink>;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let brandset = Arc::new(load_brandset(cli.brandset.as_deref())?);

    match cli.command {
        Command::Simulate {
            beverage,
            volume,
            realtime,
        } => simulate(&config, brandset, &beverage, volume, realtime),
        Command::Serve { listen } => serve(&config, brandset, listen),
    }
}

fn load_config(path: Option<&Path>) -> Result<DispenserConfig> {
    let Some(path) = path else {
        return Ok(DispenserConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    DispenserConfig::from_json(&text).with_context(|| format!("loading {}", path.display()))
}

fn load_brandset(path: Option<&Path>) -> Result<Brandset> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => DEMO_BRANDSET.to_owned(),
    };
    Brandset::from_json(&text).context("loading brandset")
}

fn build_engine(
    config: &DispenserConfig,
    brandset: Arc<Brandset>,
    link: HardwareLink,
    timer: Arc<dyn TimerService>,
) -> Result<Engine> {
    let board = Arc::new(Board::new(&config.board, link, timer).context("building board")?);
    let resolver = AssignmentResolver::new(Arc::clone(&brandset), &board, &config.assignments);
    Ok(PourEngine::new(
        brandset,
        board,
        resolver,
        LogEventSink::new(),
        config.pour.clone(),
    ))
}

// ── simulate ─────────────────────────────────────────────────

fn simulate(
    config: &DispenserConfig,
    brandset: Arc<Brandset>,
    beverage: &str,
    volume: f64,
    realtime: bool,
) -> Result<()> {
    let (controller, link) = hardware_link();
    let sim = SimBoard::new(1);
    controller.on_attach(sim.clone());

    let outcome = if realtime {
        let timer = Arc::new(ExecutorTimer::start().context("starting timer thread")?);
        let engine = build_engine(config, brandset, link, timer)?;
        engine.pour_beverage(beverage, volume).wait()
    } else {
        let timer = Arc::new(ManualTimer::new());
        let engine = build_engine(config, brandset, link, timer.clone())?;
        let pour = engine.pour_beverage(beverage, volume);
        timer.run_until_idle();
        info!("simulated {:?} of board time", timer.now());
        pour.wait()
    };

    for command in sim.commands() {
        println!(
            "PUMP pos={} rate={:.3} ml/s duration={} ms",
            command.pos,
            command.rate(),
            command.duration_ms
        );
    }
    match outcome {
        PourOutcome::Succeeded => {
            println!("{beverage}: poured");
            Ok(())
        }
        PourOutcome::Failed(reason) => bail!("{beverage}: {} ({})", reason, reason.code()),
        PourOutcome::Cancelled => bail!("{beverage}: cancelled"),
    }
}

// ── serve ────────────────────────────────────────────────────

fn serve(config: &DispenserConfig, brandset: Arc<Brandset>, listen: Option<String>) -> Result<()> {
    let (controller, link) = hardware_link();
    let timer = Arc::new(ExecutorTimer::start().context("starting timer thread")?);
    let engine = build_engine(config, brandset, link.clone(), timer)?;

    let addr = listen.unwrap_or_else(|| config.link.listen_addr.clone());
    let ack_timeout = Duration::from_millis(u64::from(config.link.ack_timeout_ms));
    let listener = AdapterListener::bind(addr.as_str(), controller, ack_timeout)
        .with_context(|| format!("binding {addr}"))?
        .spawn()
        .context("starting adapter listener")?;

    let mut current: Option<PourFuture> = None;
    for line in std::io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<DispenseCommand>() {
            Ok(DispenseCommand::Pour {
                beverage_id,
                volume_ml,
            }) => {
                if current.as_ref().is_some_and(|p| !p.is_terminal()) {
                    warn!("pour in progress, cancel it first");
                    continue;
                }
                let pour = engine.pour_beverage(&beverage_id, volume_ml);
                pour.on_complete(move |_, outcome| info!("{}: {:?}", beverage_id, outcome));
                current = Some(pour);
            }
            Ok(DispenseCommand::Cancel) => match &current {
                Some(pour) if pour.cancel() => info!("pour cancelled"),
                _ => info!("nothing to cancel"),
            },
            Ok(DispenseCommand::Status) => {
                println!("link: {:?}", link.state());
                match &current {
                    Some(pour) => println!("pour: {} {:?}", pour.name(), pour.state()),
                    None => println!("pour: none"),
                }
            }
            Ok(DispenseCommand::Quit) => break,
            Err(e) => warn!("{:?}: {}", line, e),
        }
    }

    if let Some(pour) = current {
        pour.cancel();
    }
    if engine.board().is_connected() {
        info!("stopped {} pumps", engine.board().stop_all());
    }
    listener.stop();
    Ok(())
}
