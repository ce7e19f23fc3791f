//! NVRAM/DRAM timing simulator CLI.
//!
//! Builds the component tree from a config file, drives it with an access
//! trace, and prints a final statistics dump.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nvsim_core::common::SimError;
use nvsim_core::config::RootConfig;
use nvsim_core::stats::{DumpType, Dumper};
use nvsim_core::sim::Simulator;
use nvsim_core::{factory, trace};

#[derive(Parser, Debug)]
#[command(
    name = "nvsim",
    author,
    version,
    about = "Cycle-accurate NVRAM/DRAM timing simulator",
    long_about = "Runs an address trace through a configured tree of memory controllers \
                  (RMC -> IMC -> RMW -> AIT -> DDR4) and reports per-component latency \
                  and event counters.\n\nExample:\n  nvsim -c config.ini -t trace.txt -v"
)]
struct Cli {
    /// Path to the INI-like configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Path to the access trace file.
    #[arg(short, long)]
    trace: PathBuf,

    /// Raise logging verbosity (repeatable: -v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    install_subscriber(cli.verbose);

    if let Err(err) = run(&cli) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn install_subscriber(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: &Cli) -> Result<(), SimError> {
    let config = RootConfig::load(&cli.config)?;
    let entries = trace::load(&cli.trace)?;
    let tree = factory::build(&config)?;

    let dump_section = config.section("dump")?;
    let dump_type = DumpType::parse(&dump_section.get_string_or("type", "cli"));
    let dump_path = dump_section.get_string_or("path", ".");
    let dump_name = dump_section.get_string_or("name", "nvsim");
    let dump_id = dump_section.get_string_or("id", "0");

    info!(
        config = %cli.config.display(),
        trace = %cli.trace.display(),
        accesses = entries.len(),
        "starting run"
    );

    let mut simulator = Simulator::new(tree);
    let _ = simulator.run(&entries);

    info!(clk = simulator.clock().0, "run complete");

    let mut dumper = Dumper::new(dump_type, &dump_path, &dump_name, &dump_id);
    simulator.print_counters(&mut dumper);
    dumper.flush().map_err(|e| SimError::io(dump_path.clone(), e))?;

    Ok(())
}
