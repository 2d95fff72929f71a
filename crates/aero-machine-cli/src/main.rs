//! Command-line front end: loads a ROM image into a fresh machine and runs
//! it from the reset vector, printing one disassembled line per committed
//! instruction until the CPU halts.

use std::path::PathBuf;
use std::process::ExitCode;

use aero_cpu_core::Cpu;
use aero_mem::Memory;
use clap::Parser;

/// Runs a flat ROM image against the 64-bit x86-compatible interpreter.
#[derive(Debug, Parser)]
#[command(name = "aero-machine", version)]
struct Args {
    /// Path to the ROM image; its last byte is placed at the top of memory.
    rom: PathBuf,

    /// Raise the tracing filter to `debug` (stack with `-vv` for `trace`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Stop after this many instructions even if the CPU has not halted.
    #[arg(long)]
    max_insts: Option<u64>,
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(args: Args) -> anyhow::Result<()> {
    // The reset vector is architecturally fixed at `CS.base + IP ==
    // 0xFFFFFFF0`, so memory is always sized to the reference 4 GiB flat
    // configuration: a smaller span would need the ROM's load address and
    // the wrapped fetch address to coincide, which only happens here.
    let mut mem = Memory::new_4gib();
    mem.load(&args.rom)?;

    let mut cpu = Cpu::new(mem);
    let max_insts = args.max_insts.unwrap_or(u64::MAX);
    let mut executed = 0u64;
    while executed < max_insts {
        if !aero_cpu_core::step(&mut cpu) {
            break;
        }
        if let Some(line) = cpu.last_disasm.take() {
            println!("{line}");
        }
        executed += 1;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("aero-machine: {err}");
            ExitCode::FAILURE
        }
    }
}
