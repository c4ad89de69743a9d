#![forbid(unsafe_code)]

mod app;
mod config;
mod event;
mod terrain;

use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use simplelog::{ColorChoice, CombinedLogger, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use vantage_blocks::BlockRegistry;

use crate::app::App;
use crate::config::ServerConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless chunk relevance and meshing server loop", long_about = None)]
struct Args {
    /// Server config (TOML); built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Block definitions (TOML); built-in set when omitted
    #[arg(long)]
    blocks: Option<PathBuf>,

    /// Ticks to simulate (overrides sim.ticks)
    #[arg(long)]
    ticks: Option<u64>,

    /// Connected observers (overrides sim.observers)
    #[arg(long)]
    observers: Option<u32>,

    /// Run ticks back to back instead of pacing to sim.tick_ms
    #[arg(long)]
    fast: bool,

    #[arg(short, long)]
    verbose: bool,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(args: &Args) -> Result<(), Box<dyn Error>> {
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    match &args.log_file {
        Some(path) => {
            CombinedLogger::init(vec![
                TermLogger::new(level, simplelog::Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
                WriteLogger::new(level, simplelog::Config::default(), File::create(path)?),
            ])?;
        }
        None => {
            let default = if args.verbose { "debug" } else { "info" };
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
                .try_init()?;
        }
    }
    Ok(())
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    init_logging(&args)?;

    let mut cfg = match &args.config {
        Some(path) => {
            log::info!("loading config from {}", path.display());
            ServerConfig::load_from_path(path)?
        }
        None => ServerConfig::default(),
    };
    if let Some(t) = args.ticks {
        cfg.sim.ticks = t;
    }
    if let Some(n) = args.observers {
        cfg.sim.observers = n;
    }
    cfg.validate()?;

    let reg = match &args.blocks {
        Some(path) => {
            let reg = BlockRegistry::load_from_path(path)?;
            log::info!("loaded {} block types from {}", reg.len(), path.display());
            reg
        }
        None => BlockRegistry::builtin(),
    };

    log::info!(
        "world '{}': {} observer(s), view {}x{}, load {}x{}, {} mesh worker(s), {:?} order",
        cfg.world.id,
        cfg.sim.observers,
        cfg.view.horizontal,
        cfg.view.vertical,
        cfg.load.horizontal,
        cfg.load.vertical,
        cfg.mesh.worker_threads,
        cfg.mesh.order
    );
    let ticks = cfg.sim.ticks;
    let mut app = App::new(cfg, Arc::new(reg))?;
    let s = app.run(ticks, !args.fast)?;
    log::info!(
        "done after {} ticks: stores={} removes={} relevance changes={} meshes built={} failures={} discarded={} mesh events={}",
        s.ticks,
        s.tracker.stores_sent,
        s.tracker.removes_sent,
        s.relevance_changes,
        s.pipeline.builds_completed,
        s.pipeline.failures,
        s.pipeline.discarded,
        s.mesh_events
    );
    if s.replica_anomalies > 0 {
        return Err(format!("{} replica anomalies detected", s.replica_anomalies).into());
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
