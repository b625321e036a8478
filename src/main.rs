//! E20 Simulator - CLI Entry Point
//!
//! `e20-sim <image>` loads a machine image, runs it until it halts, and
//! prints the final processor state.

use clap::Parser;
use e20::{Cpu, CpuState, SimConfig, AddressWidth, Snapshot, StateReport};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code when the image cannot be loaded.
const EXIT_LOAD_ERROR: u8 = 1;
/// Exit code when the run ended in a fault.
const EXIT_FAULT: u8 = 2;

#[derive(Parser)]
#[command(name = "e20-sim")]
#[command(version)]
#[command(about = "Simulate an E20 machine")]
struct Cli {
    /// The file containing machine code, typically with .bin suffix
    image: String,

    /// JSON file with simulator settings; flags override it
    #[arg(long)]
    config: Option<String>,

    /// Stop after this many instructions
    #[arg(short, long)]
    max_cycles: Option<u64>,

    /// Reduce lw/sw addresses to 14 bits; addresses past memory fault
    #[arg(long)]
    legacy_address_mask: bool,

    /// Memory words to include in the final state
    #[arg(long)]
    dump_words: Option<usize>,

    /// Log every executed instruction to stderr
    #[arg(short, long)]
    trace: bool,

    /// Print the final state as JSON
    #[arg(long)]
    json: bool,

    /// Print a disassembly of the image and exit
    #[arg(long)]
    disasm: bool,

    /// Open the interactive debugger
    #[cfg(feature = "tui")]
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.trace);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_LOAD_ERROR);
        }
    };

    let image = match e20::load_image(&cli.image) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_LOAD_ERROR);
        }
    };

    if cli.disasm {
        print!("{}", e20::disassemble(&image.words));
        return ExitCode::SUCCESS;
    }

    #[cfg(feature = "tui")]
    {
        if cli.debug {
            return match e20::run_debugger(image.words, config) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Debugger error: {}", e);
                    ExitCode::FAILURE
                }
            };
        }
    }

    let mut cpu = Cpu::with_config(&config);
    if let Err(e) = cpu.load_image(&image.words) {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_LOAD_ERROR);
    }

    let summary = match config.max_cycles {
        Some(limit) => cpu.run_limited(limit),
        None => cpu.run(),
    };

    if let Some(fault) = cpu.fault() {
        eprintln!("Error: {} at pc {}, halting", fault, cpu.regs.pc);
    } else if summary.state == CpuState::Running {
        eprintln!("Warning: stopped after {} cycles without halting", summary.cycles);
    }

    if cli.json {
        match serde_json::to_string_pretty(&Snapshot::capture(&cpu, config.dump_words)) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print!("{}", StateReport::new(&cpu, config.dump_words));
    }

    if cpu.is_faulted() {
        ExitCode::from(EXIT_FAULT)
    } else {
        ExitCode::SUCCESS
    }
}

/// Merge the optional JSON settings file with command-line flags.
fn build_config(cli: &Cli) -> Result<SimConfig, String> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("{}: {}", path, e))?;
            serde_json::from_str(&text).map_err(|e| format!("{}: {}", path, e))?
        }
        None => SimConfig::default(),
    };

    if cli.max_cycles.is_some() {
        config.max_cycles = cli.max_cycles;
    }
    if cli.legacy_address_mask {
        config.address_width = AddressWidth::Legacy14;
    }
    if let Some(words) = cli.dump_words {
        config.dump_words = words;
    }

    Ok(config)
}

/// Send logs to stderr so stdout carries only the state report.
fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("e20=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
