//! Configuration types deserialized from `rtlcov.toml`.

use serde::Deserialize;

/// The top-level configuration parsed from `rtlcov.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectConfig {
    /// External simulator command configuration.
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// The external simulator commands the coverage driver invokes.
#[derive(Debug, Deserialize)]
pub struct SimulatorConfig {
    /// Compiler executable.
    #[serde(default = "default_compile")]
    pub compile: String,
    /// Extra arguments placed before `-o OUT`.
    #[serde(default = "default_compile_args")]
    pub compile_args: Vec<String>,
    /// Runtime executable that executes the compiled design.
    #[serde(default = "default_run")]
    pub run: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            compile: default_compile(),
            compile_args: default_compile_args(),
            run: default_run(),
        }
    }
}

fn default_compile() -> String {
    "iverilog".to_string()
}

fn default_compile_args() -> Vec<String> {
    vec!["-g2005-sv".to_string()]
}

fn default_run() -> String {
    "vvp".to_string()
}
