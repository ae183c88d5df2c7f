//! External Verilog simulator driver.
//!
//! rtlcov never simulates anything itself: it compiles the testbench plus
//! the instrumented RTL with an external Verilog-2005-capable compiler and
//! then executes the result, expecting the testbench's `$dumpvars` to
//! produce the VCD. Both child processes run to completion with captured
//! output; compile failures carry their streams and exit code so the CLI
//! can pass them through verbatim.

#![warn(missing_docs)]

pub mod driver;
pub mod error;

pub use driver::{RunOutput, Simulator};
pub use error::SimulatorError;
