//! rv-hostlink - CLI Entry Point
//!
//! Commands:
//! - `rv-hostlink run <program>` - Run a program under an interactive operator
//! - `rv-hostlink check <program>` - Assemble a program and print its listing
//!
//! Exit status: 0 when the program halts (or hits the cycle limit), 1 when the
//! operator cancels, 2 on any other error.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hostlink::asm::parse_address;
use hostlink::{
    assemble, listing, AssemblerError, ConfigError, ConsoleBridge, Cpu, CpuError, CpuState,
    HostConfig, HostLink,
};

#[derive(Parser)]
#[command(name = "rv-hostlink")]
#[command(version)]
#[command(about = "Run emulated programs under an interactive operator: step, break, feed input")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts or the operator quits
    Run(RunArgs),
    /// Assemble a program and print its listing
    Check {
        /// Path to the program source
        program: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to the program source
    program: PathBuf,
    /// Use the line-oriented console operator instead of the terminal UI
    #[arg(long)]
    console: bool,
    /// Stop after the first instruction and wait for the operator
    #[arg(long)]
    step: bool,
    /// Register width: 32 or 64
    #[arg(long)]
    xlen: Option<u32>,
    /// Arm a breakpoint (decimal or 0x hex address); repeatable
    #[arg(long = "break", value_name = "ADDR", value_parser = parse_break_address)]
    breakpoints: Vec<u64>,
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
    /// Maximum number of instructions to run
    #[arg(long)]
    max_cycles: Option<u64>,
    /// Report every register write
    #[arg(short, long)]
    trace: bool,
}

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("assembly error: {0}")]
    Asm(#[from] AssemblerError),
    #[error("{path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot open log file: {0}")]
    Log(std::io::Error),
    #[error("terminal: {0}")]
    Terminal(std::io::Error),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => run(args),
        Commands::Check { program } => check(&program),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("rv-hostlink: {e}");
            std::process::exit(2);
        }
    }
}

fn parse_break_address(text: &str) -> Result<u64, String> {
    parse_address(text).ok_or_else(|| format!("not an address: {text}"))
}

fn read_program(path: &Path) -> Result<Vec<hostlink::Instruction>, RunError> {
    let source = std::fs::read_to_string(path).map_err(|source| RunError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(assemble(&source)?)
}

fn check(path: &Path) -> Result<i32, RunError> {
    let program = read_program(path)?;
    print!("{}", listing(&program));
    println!("; {} instructions", program.len());
    Ok(0)
}

/// Install the log subscriber. Filtering follows RUST_LOG.
///
/// The terminal UI owns the screen, so it only gets logs with a log file.
fn init_logging(log_file: Option<&Path>, tui: bool) -> Result<(), RunError> {
    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());
    match log_file {
        Some(path) => {
            let file = File::create(path).map_err(RunError::Log)?;
            builder.with_writer(Mutex::new(file)).with_ansi(false).init();
        }
        None if tui => {}
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn run(args: RunArgs) -> Result<i32, RunError> {
    let mut config = match &args.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    if let Some(xlen) = args.xlen {
        config.xlen = xlen;
    }
    if args.step {
        config.start_in_step = true;
    }
    if let Some(max_cycles) = args.max_cycles {
        config.max_cycles = max_cycles;
    }
    config.breakpoints.extend(&args.breakpoints);
    config.validate()?;

    let use_tui = cfg!(feature = "tui") && !args.console;
    init_logging(args.log_file.as_deref(), use_tui)?;

    let program = read_program(&args.program)?;
    let (link, operator) = HostLink::new(config.register_width()?, config.disposition());
    let mut cpu = Cpu::new(program, link).with_trace(args.trace);
    info!(
        program = %args.program.display(),
        xlen = config.xlen,
        instructions = cpu.program().len(),
        "starting"
    );

    let summary = if use_tui {
        run_tui(&mut cpu, &operator, &config)?
    } else {
        let mut bridge = ConsoleBridge::new(&operator, std::io::stdin().lock(), std::io::stdout())
            .with_breakpoints(config.armed_breakpoints());
        let result = cpu.run_limited(&mut bridge, config.max_cycles);
        summarize(&cpu, result, config.max_cycles)
    };

    eprintln!("{}", summary.0);
    Ok(summary.1)
}

#[cfg(feature = "tui")]
fn run_tui(
    cpu: &mut Cpu,
    operator: &hostlink::Operator,
    config: &HostConfig,
) -> Result<(String, i32), RunError> {
    let mut bridge = hostlink::TuiBridge::enter(
        operator,
        cpu.program().to_vec(),
        config.armed_breakpoints(),
        config.poll_quantum(),
    )
    .map_err(RunError::Terminal)?;

    let result = cpu.run_limited(&mut bridge, config.max_cycles);
    let summary = summarize(cpu, result, config.max_cycles);
    if !operator.is_cancelled() {
        bridge.finish(summary.0.clone());
    }
    Ok(summary)
}

#[cfg(not(feature = "tui"))]
fn run_tui(
    _cpu: &mut Cpu,
    _operator: &hostlink::Operator,
    _config: &HostConfig,
) -> Result<(String, i32), RunError> {
    Err(RunError::Terminal(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "built without the tui feature; use --console",
    )))
}

/// Status line and exit code for a finished run.
fn summarize(cpu: &Cpu, result: Result<u64, CpuError>, max_cycles: u64) -> (String, i32) {
    match result {
        Ok(_) if cpu.state == CpuState::Halted => {
            info!(cycles = cpu.cycles, "halted");
            (format!("Halted after {} instructions", cpu.cycles), 0)
        }
        Ok(_) => {
            warn!(max_cycles, "cycle limit reached");
            (format!("Stopped at the cycle limit ({max_cycles})"), 0)
        }
        Err(e) if e.is_cancelled() => (format!("Cancelled after {} instructions", cpu.cycles), 1),
        Err(e) => (format!("Error at pc {:#010x}: {e}", cpu.regs.pc), 2),
    }
}
