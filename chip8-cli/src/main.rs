//! chip8 CLI - run and disassemble program images

use anyhow::{Context, Result};
use chip8_core::constants::{INSTRUCTION_WIDTH, PROGRAM_START};
use chip8_core::{decode, HeadlessPeripheral, Peripheral};
use chip8_vm::{MachineBuilder, RunLimits, VmConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod image;
mod terminal;

use config::Config;
use terminal::TerminalPeripheral;

#[derive(Parser)]
#[command(name = "chip8")]
#[command(about = "chip8 virtual machine with a subroutine JIT", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program image
    Run {
        /// Path to the image, or `-` to read hex from stdin
        image: PathBuf,

        /// The image file holds hex text
        #[arg(long)]
        hex: bool,

        /// Interpret only
        #[arg(long)]
        no_jit: bool,

        /// Run as fast as possible instead of at the configured clock
        #[arg(long)]
        no_pace: bool,

        /// Render the framebuffer to the terminal
        #[arg(long)]
        render: bool,

        /// Stop after this many seconds
        #[arg(long, value_name = "SECS")]
        time_limit: Option<f64>,

        /// Stop after this many cycles
        #[arg(long, value_name = "N")]
        max_cycles: Option<u64>,
    },

    /// Disassemble a program image
    Disasm {
        /// Path to the image, or `-` to read hex from stdin
        image: PathBuf,

        /// The image file holds hex text
        #[arg(long)]
        hex: bool,
    },
}

struct RunArgs {
    image: PathBuf,
    hex: bool,
    no_jit: bool,
    no_pace: bool,
    render: bool,
    time_limit: Option<f64>,
    max_cycles: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config(cli.config)?;

    match cli.command {
        Commands::Run {
            image,
            hex,
            no_jit,
            no_pace,
            render,
            time_limit,
            max_cycles,
        } => run(
            RunArgs {
                image,
                hex,
                no_jit,
                no_pace,
                render,
                time_limit,
                max_cycles,
            },
            &config,
        ),
        Commands::Disasm { image, hex } => disasm(image, hex),
    }
}

fn run(args: RunArgs, config: &Config) -> Result<()> {
    let image = image::read_image(&args.image, args.hex)?;

    let mut machine_config: VmConfig = config.machine.clone();
    if args.no_jit {
        machine_config.jit.enabled = false;
    }
    if args.no_pace {
        machine_config.pace = false;
    }

    let limits = RunLimits {
        max_cycles: args.max_cycles,
        time_limit: args
            .time_limit
            .map(Duration::try_from_secs_f64)
            .transpose()
            .context("invalid --time-limit")?,
    };

    let bell = config.display.bell;
    let peripheral: Box<dyn Peripheral> = if args.render || config.display.render {
        match TerminalPeripheral::new(bell) {
            Ok(terminal) => Box::new(terminal),
            Err(err) => {
                warn!("terminal unavailable, running headless: {:#}", err);
                Box::new(HeadlessPeripheral::new().with_bell(bell))
            }
        }
    } else {
        Box::new(HeadlessPeripheral::new().with_bell(bell))
    };

    let mut machine = MachineBuilder::with_peripheral(peripheral)
        .with_config(machine_config)
        .with_program(image)
        .build()?;

    let result = machine.run_with_limits(limits);

    if let Some(stats) = machine.jit_stats() {
        info!(
            compile_requests = stats.compile_requests,
            blocks_compiled = stats.blocks_compiled,
            blocks_discarded = stats.blocks_discarded,
            invalidations = stats.invalidations,
            compile_failures = stats.compile_failures,
            cached_blocks = stats.cached_blocks,
            "JIT statistics"
        );
    }

    let outcome = result.with_context(|| {
        format!("machine fault at pc 0x{:03x}", machine.cpu().pc)
    })?;
    println!(
        "stopped after {} cycles ({:?}), pc = 0x{:03x}",
        machine.cycles(),
        outcome,
        machine.cpu().pc
    );
    Ok(())
}

fn disasm(path: PathBuf, hex: bool) -> Result<()> {
    let image = image::read_image(&path, hex)?;

    for (i, chunk) in image.chunks(INSTRUCTION_WIDTH as usize).enumerate() {
        let addr = PROGRAM_START as usize + i * INSTRUCTION_WIDTH as usize;
        match *chunk {
            [high, low] => {
                let word = u16::from_be_bytes([high, low]);
                println!("{:03x}: {:04x}  {}", addr, word, decode(word));
            }
            [byte] => println!("{:03x}: {:02x}", addr, byte),
            _ => {}
        }
    }
    Ok(())
}
