//! The `--toggle` side report: per-bit toggle coverage plus optional
//! clock-sampled instruction histograms over an existing VCD.

use std::fs::File;
use std::io::{BufReader, Write};

use rtlcov_report::format_percent;
use rtlcov_vcd::defs::parse_definitions;
use rtlcov_vcd::toggle::{analyze_toggle, ToggleOptions, ToggleReport};

use crate::Cli;

/// Runs the toggle/functional analysis. Returns the process exit code.
pub fn run(cli: &Cli) -> Result<i32, Box<dyn std::error::Error>> {
    let Some(vcd_path) = &cli.vcd else {
        eprintln!("error: --vcd is required");
        return Ok(2);
    };
    if !vcd_path.is_file() {
        eprintln!("error: VCD not found: {}", vcd_path.display());
        return Ok(2);
    }

    let defs = parse_definitions(BufReader::new(File::open(vcd_path)?))?;
    if !defs.warnings.is_empty() && !cli.quiet {
        eprintln!(
            "warning: {} malformed VCD directive(s) skipped",
            defs.warnings.len()
        );
    }

    let opts = ToggleOptions {
        scope_prefix: cli.scope_prefix.clone(),
        include_all: cli.include_tb,
        clock_suffix: cli.clock.clone(),
        pc_suffix: cli.pc.clone(),
        instr_suffix: cli.instr.clone(),
    };
    let report = analyze_toggle(BufReader::new(File::open(vcd_path)?), &defs, &opts)?;

    let sampling_requested =
        cli.clock.is_some() || cli.pc.is_some() || cli.instr.is_some();
    let stdout = std::io::stdout();
    write_toggle_report(
        &mut stdout.lock(),
        &report,
        cli.scopes,
        cli.top_uncovered,
        sampling_requested,
    )?;
    Ok(0)
}

/// Renders the toggle report sections.
pub fn write_toggle_report<W: Write>(
    w: &mut W,
    report: &ToggleReport,
    scopes: usize,
    top_signals: usize,
    sampling_requested: bool,
) -> std::io::Result<()> {
    writeln!(w, "=================================================================")?;
    writeln!(w, "VCD toggle coverage")?;
    writeln!(w, "=================================================================")?;
    writeln!(
        w,
        "Bits covered: {}/{} ({})",
        report.total_covered,
        report.total_bits,
        format_percent(report.total_covered, report.total_bits)
    )?;
    writeln!(w)?;

    writeln!(w, "Least covered scopes:")?;
    for (scope, bits) in report.scopes.iter().take(scopes) {
        let name = if scope.is_empty() { "<root>" } else { scope };
        writeln!(
            w,
            "- {}: {}/{} ({})",
            name,
            bits.covered,
            bits.total,
            format_percent(bits.covered, bits.total)
        )?;
    }
    writeln!(w)?;

    writeln!(w, "Least covered signals:")?;
    for var in report.vars.iter().take(top_signals) {
        writeln!(
            w,
            "- {}: {}/{} ({})",
            var.name,
            var.covered,
            var.total,
            format_percent(var.covered, var.total)
        )?;
    }

    if !sampling_requested {
        return Ok(());
    }
    writeln!(w)?;
    writeln!(w, "=================================================================")?;
    writeln!(w, "Functional coverage (sampled on rising clock edges)")?;
    writeln!(w, "=================================================================")?;
    let Some(func) = &report.functional else {
        writeln!(w, "Could not locate clock/pc/instruction signals in the VCD.")?;
        return Ok(());
    };
    writeln!(w, "Sampled instructions: {}", func.samples)?;
    if func.samples > 0 {
        writeln!(
            w,
            "Unique PCs: {} (min={}, max={})",
            func.unique_pcs, func.pc_min, func.pc_max
        )?;
    }
    writeln!(w)?;
    writeln!(w, "Opcodes executed (hex):")?;
    let opcodes: Vec<String> = func
        .opcode_hist
        .iter()
        .map(|(op, count)| format!("{op:02x}({count})"))
        .collect();
    writeln!(w, "{}", opcodes.join(" "))?;
    if !func.funct_hist.is_empty() {
        writeln!(w)?;
        writeln!(w, "SPECIAL funct executed (hex):")?;
        let functs: Vec<String> = func
            .funct_hist
            .iter()
            .map(|(fn_, count)| format!("{fn_:02x}({count})"))
            .collect();
        writeln!(w, "{}", functs.join(" "))?;
    }
    if !func.regimm_rt_hist.is_empty() {
        writeln!(w)?;
        writeln!(w, "REGIMM rt executed (bin/dec):")?;
        let rts: Vec<String> = func
            .regimm_rt_hist
            .iter()
            .map(|(rt, count)| format!("{rt:05b}({rt})[{count}]"))
            .collect();
        writeln!(w, "{}", rts.join(" "))?;
    }
    Ok(())
}
