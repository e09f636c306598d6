pub mod config;
pub mod input;
pub mod persist;

use crate::config::Config;
use crate::input::read_samples_from_path;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use topomem_core::{
    AnyCell, CellCoord, Eligibility, RelaxConfig, StoreOutcome, TopoMap, WithinRegion,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "topomem")]
#[command(about = "Topology-preserving associative memory over a 2D cell lattice")]
struct Cli {
    /// Configuration file (defaults to ~/.topomem/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Map dump to read and write (overrides `run.dump_file`)
    #[arg(long, global = true)]
    dump: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file with default map settings
    InitConfig {
        // Relaxation settings recorded in the new file
        #[command(flatten)]
        relax: RelaxConfig,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Present vectors from a CSV file (`provenance,bits`) to the map
    Store {
        #[arg(long)]
        input: PathBuf,
        /// Restrict winners to a disc: `x,y,radius`
        #[arg(long, value_parser = parse_disc)]
        within: Option<WithinRegion>,
    },
    /// Relax stored memories until the map settles
    Relax {
        /// Override `relax.max_iterations` from the configuration
        #[arg(long)]
        max_iterations: Option<u32>,
    },
    /// Report the best-matching cell for each vector in a CSV file
    Recall {
        #[arg(long)]
        input: PathBuf,
    },
    /// Print occupancy and bit-count histograms as JSON
    Stats {
        /// Also print the contents of one cell: `x,y`
        #[arg(long, value_parser = parse_coord)]
        cell: Option<CellCoord>,
    },
}

fn parse_coord(s: &str) -> Result<CellCoord, String> {
    let (x, y) = s.split_once(',').ok_or("expected x,y")?;
    let x = x.trim().parse().map_err(|e| format!("x: {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("y: {e}"))?;
    Ok(CellCoord::new(x, y))
}

fn parse_disc(s: &str) -> Result<WithinRegion, String> {
    let (coord, radius) = s.rsplit_once(',').ok_or("expected x,y,radius")?;
    let center = parse_coord(coord)?;
    let radius = radius
        .trim()
        .parse()
        .map_err(|e| format!("radius: {e}"))?;
    Ok(WithinRegion { center, radius })
}

struct Session {
    config: Config,
    dump: PathBuf,
}

impl Session {
    fn open(config_path: Option<&std::path::Path>, dump: Option<PathBuf>) -> Result<Self> {
        let config = Config::load(config_path)?;
        let dump = dump.unwrap_or_else(|| config.dump_path());
        Ok(Self { config, dump })
    }

    fn rng(&self) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(self.config.run.seed)
    }

    fn load(&self) -> Result<TopoMap> {
        persist::load_map(&self.config.map, &self.dump)
    }

    fn save(&self, map: &TopoMap) -> Result<()> {
        persist::save_map(
            map,
            &self.dump,
            self.config.run.compress,
            self.config.run.zstd_level,
        )
    }
}

fn init_config(path: Option<PathBuf>, relax: RelaxConfig, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(Config::default_path);
    if path.exists() && !force {
        warn!(path = %path.display(), "Configuration exists; pass --force to overwrite");
        return Ok(());
    }
    let config = Config {
        relax,
        ..Config::default()
    };
    config.save(&path)?;
    info!(path = %path.display(), "Wrote configuration");
    Ok(())
}

fn store(session: &Session, input: PathBuf, within: Option<WithinRegion>) -> Result<()> {
    let mut map = session.load()?;
    let samples = read_samples_from_path(&input, map.config().hash_len)?;
    let mut rng = session.rng();
    let eligibility: Box<dyn Eligibility> = match within {
        Some(region) => Box::new(region),
        None => Box::new(AnyCell),
    };

    let mut rejected = 0usize;
    let mut placements = 0usize;
    for sample in &samples {
        match map.select_and_store(&sample.vector, sample.provenance, &*eligibility, &mut rng)? {
            StoreOutcome::Rejected { .. } => rejected += 1,
            StoreOutcome::Stored { winners } => placements += winners.len(),
        }
    }

    info!(
        inputs = samples.len(),
        rejected,
        placements,
        total_memories = map.total_memories(),
        "Store complete"
    );
    session.save(&map)
}

fn relax(session: &Session, max_iterations: Option<u32>) -> Result<()> {
    let mut map = session.load()?;
    let mut config = session.config.relax;
    if let Some(n) = max_iterations {
        config.max_iterations = n;
    }
    let mut rng = session.rng();

    let rt = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current iteration");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let outcome = rt.block_on(map.relax_async(config, &mut rng, Some(&cancel), |report| async move {
        info!(
            iteration = report.iteration,
            changed = report.changed,
            min_changed = report.min_changed,
            plateau = report.plateau,
            "Relaxation progress"
        );
        tokio::task::yield_now().await;
        ControlFlow::Continue(())
    }));

    info!(
        iterations = outcome.iterations,
        final_changed = outcome.final_changed,
        stop = ?outcome.stop,
        "Relaxation finished"
    );
    session.save(&map)
}

#[derive(Serialize)]
struct RecallLine {
    provenance: u64,
    cell: Option<CellCoord>,
    super_activity: Option<f32>,
    memories_at_cell: Option<usize>,
}

fn recall(session: &Session, input: PathBuf) -> Result<()> {
    let map = session.load()?;
    let samples = read_samples_from_path(&input, map.config().hash_len)?;
    for sample in &samples {
        let hit = map.recall(&sample.vector)?;
        let memories_at_cell = match &hit {
            Some(h) => Some(map.memories_at(h.coord)?.len()),
            None => None,
        };
        let line = RecallLine {
            provenance: sample.provenance.0,
            cell: hit.map(|h| h.coord),
            super_activity: hit.map(|h| h.super_activity),
            memories_at_cell,
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn stats(session: &Session, cell: Option<CellCoord>) -> Result<()> {
    let map = session.load()?;
    println!("{}", serde_json::to_string_pretty(&map.stats())?);
    if let Some(coord) = cell {
        println!("{}", serde_json::to_string_pretty(&map.cell_snapshot(coord)?)?);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::InitConfig { relax, force } => init_config(cli.config, relax, force),
        Commands::Store { input, within } => {
            store(&Session::open(cli.config.as_deref(), cli.dump)?, input, within)
        }
        Commands::Relax { max_iterations } => {
            relax(&Session::open(cli.config.as_deref(), cli.dump)?, max_iterations)
        }
        Commands::Recall { input } => recall(&Session::open(cli.config.as_deref(), cli.dump)?, input),
        Commands::Stats { cell } => stats(&Session::open(cli.config.as_deref(), cli.dump)?, cell),
    }
}

fn main() {
    let cli = Cli::parse();

    // Structured logging; records from the core's `log` calls are bridged in
    tracing_subscriber::fmt()
        .json()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        error!(error = %format!("{e:#}"), "Fatal Error");
        std::process::exit(1);
    }
}
