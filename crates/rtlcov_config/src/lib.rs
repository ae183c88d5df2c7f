//! Configuration loading for rtlcov.
//!
//! Configuration lives in an optional `rtlcov.toml`; its only section today
//! selects the external simulator commands. A missing file means defaults
//! (`iverilog -g2005-sv` / `vvp`).

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, load_config_optional};
pub use types::{ProjectConfig, SimulatorConfig};
