//! Compile-and-run driver for the external simulator.

use std::path::Path;
use std::process::Command;

use rtlcov_config::SimulatorConfig;

use crate::error::SimulatorError;

/// Captured output of a successful child process.
#[derive(Debug)]
pub struct RunOutput {
    /// The child's standard output.
    pub stdout: String,
    /// The child's standard error.
    pub stderr: String,
}

/// The external simulator command pair.
#[derive(Debug, Clone)]
pub struct Simulator {
    compile: String,
    compile_args: Vec<String>,
    run: String,
}

impl Simulator {
    /// Builds a driver from the `[simulator]` configuration section.
    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self {
            compile: config.compile.clone(),
            compile_args: config.compile_args.clone(),
            run: config.run.clone(),
        }
    }

    /// Compiles the testbench and RTL files into `out`.
    ///
    /// Invocation shape: `COMPILE [ARGS..] -o OUT TB RTL..`, executed in
    /// `cwd` so relative paths inside the testbench keep working. A
    /// non-zero exit becomes [`SimulatorError::Compile`] carrying both
    /// streams for verbatim passthrough.
    pub fn compile(
        &self,
        cwd: &Path,
        out: &Path,
        tb: &Path,
        rtl: &[std::path::PathBuf],
    ) -> Result<RunOutput, SimulatorError> {
        let mut cmd = Command::new(&self.compile);
        cmd.current_dir(cwd)
            .args(&self.compile_args)
            .arg("-o")
            .arg(out)
            .arg(tb)
            .args(rtl);
        let output = cmd.output().map_err(|source| SimulatorError::Launch {
            program: self.compile.clone(),
            source,
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(SimulatorError::Compile {
                code: output.status.code().unwrap_or(1),
                stdout,
                stderr,
            });
        }
        Ok(RunOutput { stdout, stderr })
    }

    /// Executes the compiled design.
    ///
    /// Output streams are returned either way; a non-zero exit becomes
    /// [`SimulatorError::Run`].
    pub fn run(&self, cwd: &Path, exe: &Path) -> Result<RunOutput, SimulatorError> {
        let output = Command::new(&self.run)
            .current_dir(cwd)
            .arg(exe)
            .output()
            .map_err(|source| SimulatorError::Launch {
                program: self.run.clone(),
                source,
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(SimulatorError::Run {
                code: output.status.code().unwrap_or(1),
                stdout,
                stderr,
            });
        }
        Ok(RunOutput { stdout, stderr })
    }
}
