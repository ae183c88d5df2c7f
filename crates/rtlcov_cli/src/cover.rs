//! The line/branch coverage pipeline.
//!
//! instrument → simulate → parse VCD definitions → scan for probe hits →
//! report. The full pipeline:
//!
//! 1. Discover `*.v` files under `--rtl-dir`
//! 2. Instrument each into the working directory, threading the global
//!    probe counter
//! 3. Compile and run the testbench against the instrumented RTL
//! 4. Map probe names to VCD codes (leaf-name match) and scan for `1`s
//! 5. Aggregate and render console/JSON/HTML reports

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rtlcov_instrument::instrument_file;
use rtlcov_probe::{Probe, ProbeAllocator};
use rtlcov_report::{
    build_report, line_statuses, render_html, write_json, write_summary, SourceListing,
};
use rtlcov_sim::{Simulator, SimulatorError};
use rtlcov_vcd::{parse_definitions, resolve_probe_codes, scan_scalar_ones};

use crate::Cli;

/// Runs the coverage pipeline. Returns the process exit code.
pub fn run(cli: &Cli) -> Result<i32, Box<dyn std::error::Error>> {
    // Step 1: validate inputs
    let Some(rtl_dir) = &cli.rtl_dir else {
        eprintln!("error: --rtl-dir is required");
        return Ok(2);
    };
    let Some(vcd_path) = &cli.vcd else {
        eprintln!("error: --vcd is required");
        return Ok(2);
    };
    if !cli.no_run && cli.tb.is_none() {
        eprintln!("error: --tb is required unless --no-run is given");
        return Ok(2);
    }
    let rtl_files = discover_rtl_files(rtl_dir)?;
    if rtl_files.is_empty() {
        eprintln!("error: no .v files found in {}", rtl_dir.display());
        return Ok(2);
    }
    if let Some(tb) = &cli.tb {
        if !tb.is_file() {
            eprintln!("error: testbench not found: {}", tb.display());
            return Ok(2);
        }
    }

    let config = match &cli.config {
        Some(path) => rtlcov_config::load_config(path)?,
        None => rtlcov_config::load_config_optional(Path::new("."))?,
    };

    // Step 2: instrument into the working directory
    let workdir = Workdir::new(cli.work.clone())?;
    let inst_dir = workdir.path().join("rtl");
    fs::create_dir_all(&inst_dir)?;

    let mut alloc = ProbeAllocator::new();
    let mut probes: Vec<Probe> = Vec::new();
    let mut inst_files: Vec<PathBuf> = Vec::new();
    for src in &rtl_files {
        let name = src.file_name().unwrap_or(src.as_os_str());
        let dst = inst_dir.join(name);
        let file_probes = instrument_file(src, &dst, &mut alloc)?;
        if cli.verbose {
            eprintln!("   {}: {} probe(s)", src.display(), file_probes.len());
        }
        probes.extend(file_probes);
        inst_files.push(dst);
    }
    if !cli.quiet {
        eprintln!(
            "   Instrumented {} file(s), {} probe(s)",
            rtl_files.len(),
            probes.len()
        );
    }

    // Step 3: compile and run
    if let (false, Some(tb)) = (cli.no_run, &cli.tb) {
        let sim = Simulator::from_config(&config.simulator);
        let out_vvp = workdir.path().join("cov_tb.vvp");
        let cwd = std::env::current_dir()?;

        if !cli.quiet {
            eprintln!("   Compiling with {}", config.simulator.compile);
        }
        match sim.compile(&cwd, &out_vvp, tb, &inst_files) {
            Ok(_) => {}
            Err(SimulatorError::Compile {
                code,
                stdout,
                stderr,
            }) => {
                eprint!("{stdout}{stderr}");
                eprintln!("error: compilation failed with exit code {code}");
                return Ok(if code == 0 { 1 } else { code });
            }
            Err(e) => return Err(e.into()),
        }

        if !cli.quiet {
            eprintln!("   Running {}", config.simulator.run);
        }
        match sim.run(&cwd, &out_vvp) {
            Ok(out) => {
                print!("{}", out.stdout);
                eprint!("{}", out.stderr);
            }
            Err(SimulatorError::Run {
                code,
                stdout,
                stderr,
            }) => {
                print!("{stdout}");
                eprint!("{stderr}");
                eprintln!("error: simulation failed with exit code {code}");
                return Ok(if code == 0 { 1 } else { code });
            }
            Err(e) => return Err(e.into()),
        }
    }

    if !vcd_path.is_file() {
        eprintln!("error: VCD not found: {}", vcd_path.display());
        return Ok(2);
    }

    // Step 4: map probes to codes and scan for hits
    let defs = parse_definitions(BufReader::new(fs::File::open(vcd_path)?))?;
    if !defs.warnings.is_empty() && !cli.quiet {
        eprintln!(
            "warning: {} malformed VCD directive(s) skipped",
            defs.warnings.len()
        );
    }
    let probe_names: HashSet<String> = probes.iter().map(|p| p.name.clone()).collect();
    let (code_by_name, missing) = resolve_probe_codes(&defs, &probe_names);
    if !missing.is_empty() {
        eprintln!(
            "warning: {} probe(s) not found in the VCD (is $dumpvars depth sufficient?)",
            missing.len()
        );
    }
    let targets: HashSet<String> = code_by_name.values().cloned().collect();
    let hit_codes = scan_scalar_ones(BufReader::new(fs::File::open(vcd_path)?), &targets)?;
    let hit_names: HashSet<String> = code_by_name
        .iter()
        .filter(|(_, code)| hit_codes.contains(code.as_str()))
        .map(|(name, _)| name.clone())
        .collect();

    // Step 5: aggregate and render
    let mut sources: BTreeMap<String, String> = BTreeMap::new();
    let mut line_counts: BTreeMap<String, usize> = BTreeMap::new();
    for src in &rtl_files {
        let text = fs::read_to_string(src)?;
        let key = src.display().to_string();
        line_counts.insert(key.clone(), text.lines().count());
        sources.insert(key, text);
    }
    let report = build_report(&probes, &hit_names, &line_counts);

    let stdout = std::io::stdout();
    write_summary(&mut stdout.lock(), &report, cli.top_uncovered)?;

    if let Some(json_path) = &cli.json {
        write_json(&report, json_path)?;
        if !cli.quiet {
            eprintln!("   JSON report: {}", json_path.display());
        }
    }
    if let Some(html_path) = &cli.html {
        let listings = build_listings(&probes, &hit_names, &sources);
        fs::write(html_path, render_html(&report, &listings))?;
        if !cli.quiet {
            eprintln!("   HTML report: {}", html_path.display());
        }
    }
    Ok(0)
}

/// Sorted `*.v` files directly under `dir`, canonicalized so probe records
/// and report keys agree.
fn discover_rtl_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "v") {
            files.push(path.canonicalize()?);
        }
    }
    files.sort();
    Ok(files)
}

/// Per-file source listings with line statuses, for the HTML report.
fn build_listings(
    probes: &[Probe],
    hit: &HashSet<String>,
    sources: &BTreeMap<String, String>,
) -> BTreeMap<String, SourceListing> {
    let mut listings = BTreeMap::new();
    for (path, source) in sources {
        let file_probes = probes
            .iter()
            .filter(|p| p.file.display().to_string() == *path);
        let statuses = line_statuses(file_probes, hit, source.lines().count());
        listings.insert(
            path.clone(),
            SourceListing {
                source: source.clone(),
                statuses,
            },
        );
    }
    listings
}

/// The staging area for instrumented RTL: a kept `--work` directory or a
/// temporary one removed on exit.
enum Workdir {
    Temp(tempfile::TempDir),
    Persist(PathBuf),
}

impl Workdir {
    fn new(work: Option<PathBuf>) -> std::io::Result<Self> {
        match work {
            Some(dir) => {
                fs::create_dir_all(&dir)?;
                Ok(Workdir::Persist(dir))
            }
            None => Ok(Workdir::Temp(tempfile::tempdir()?)),
        }
    }

    fn path(&self) -> &Path {
        match self {
            Workdir::Temp(t) => t.path(),
            Workdir::Persist(p) => p,
        }
    }
}
