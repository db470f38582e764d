use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use cachesim_rs::config::{
    Config, Protocol, DEFAULT_ASSOCIATIVITY, DEFAULT_BLOCK_SIZE_BYTES, DEFAULT_CACHE_SIZE_BYTES,
};
use cachesim_rs::driver::Simulation;
use cachesim_rs::protocol::Mesi;
use cachesim_rs::trace;

/// Cycle-accurate simulator of a private-L1 MESI coherence subsystem.
#[derive(Debug, Parser)]
#[command(name = "cachesim")]
struct Cli {
    /// Coherence protocol to simulate.
    protocol: Protocol,

    /// Base path for the four per-core trace files (`<base>_0.data` .. `_3.data`).
    input_file_base: String,

    /// Total cache size in bytes, per core.
    #[arg(default_value_t = DEFAULT_CACHE_SIZE_BYTES)]
    cache_size_bytes: u64,

    /// Set associativity.
    #[arg(default_value_t = DEFAULT_ASSOCIATIVITY)]
    associativity: u64,

    /// Block size in bytes.
    #[arg(default_value_t = DEFAULT_BLOCK_SIZE_BYTES)]
    block_size_bytes: u64,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let cfg = Config::new(
        cli.protocol,
        &cli.input_file_base,
        cli.cache_size_bytes,
        cli.associativity,
        cli.block_size_bytes,
    )
    .with_context(|| format!("invalid configuration for trace base {}", cli.input_file_base))?;

    info!(
        "protocol={:?} cache_size_bytes={} associativity={} block_size_bytes={} set_count={}",
        cfg.protocol, cfg.cache_size_bytes, cfg.associativity, cfg.block_size_bytes, cfg.set_count
    );

    let traces = trace::read_traces(&cfg)
        .with_context(|| format!("while reading trace files for base {}", cli.input_file_base))?;

    let sim = Simulation::<Mesi>::new(&cfg, traces);
    let report = sim.run();

    println!("{report}");
    Ok(())
}
