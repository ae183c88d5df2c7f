//! rtlcov — source-level RTL line/branch coverage.
//!
//! Instruments the RTL under `--rtl-dir` with 1-bit probe registers, runs
//! the testbench under an external simulator, scans the resulting VCD for
//! probes that ever took the value `1`, and reports coverage per file and
//! per line. `--toggle` switches to the standalone toggle/functional report
//! over an existing VCD.

#![warn(missing_docs)]

mod cover;
mod toggle;

use std::path::PathBuf;
use std::process;

use clap::Parser;

/// RTL line/branch coverage via probe instrumentation and VCD analysis.
#[derive(Parser, Debug)]
#[command(name = "rtlcov", version, about = "RTL line/branch coverage")]
pub struct Cli {
    /// Testbench file driving the simulation.
    #[arg(long)]
    pub tb: Option<PathBuf>,

    /// Directory whose *.v files are instrumented.
    #[arg(long)]
    pub rtl_dir: Option<PathBuf>,

    /// VCD file produced by the testbench.
    #[arg(long)]
    pub vcd: Option<PathBuf>,

    /// Skip the simulator; analyze an existing VCD.
    #[arg(long)]
    pub no_run: bool,

    /// Keep instrumented RTL in this directory instead of a temporary one.
    #[arg(long)]
    pub work: Option<PathBuf>,

    /// Write a JSON report to this path.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Write an HTML report to this path.
    #[arg(long)]
    pub html: Option<PathBuf>,

    /// Maximum uncovered items listed per file on the console.
    #[arg(long, default_value_t = 50)]
    pub top_uncovered: usize,

    /// Path to a custom `rtlcov.toml` (default: ./rtlcov.toml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Suppress status output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Print per-file instrumentation details.
    #[arg(short, long)]
    pub verbose: bool,

    /// Produce the toggle/functional side report instead of line/branch
    /// coverage.
    #[arg(long)]
    pub toggle: bool,

    /// Toggle report: include testbench scopes.
    #[arg(long)]
    pub include_tb: bool,

    /// Toggle report: only count scopes with this prefix.
    #[arg(long)]
    pub scope_prefix: Option<String>,

    /// Toggle report: number of scopes listed.
    #[arg(long, default_value_t = 20)]
    pub scopes: usize,

    /// Functional sampling: hierarchical-name suffix of the clock.
    #[arg(long)]
    pub clock: Option<String>,

    /// Functional sampling: suffix of the program counter.
    #[arg(long)]
    pub pc: Option<String>,

    /// Functional sampling: suffix of the instruction word.
    #[arg(long)]
    pub instr: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let result = if cli.toggle {
        toggle::run(&cli)
    } else {
        cover::run(&cli)
    };
    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
