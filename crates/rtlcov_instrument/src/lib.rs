//! Source-to-source Verilog probe instrumentation.
//!
//! Rewrites a restricted but realistic Verilog dialect so that every
//! executable statement and every branch arm sets a dedicated 1-bit probe
//! register to `1` when it runs, without changing the behavior of the
//! original code. No AST is built: a per-line [`classify::LineKind`]
//! classifier feeds a per-module state machine in [`instrument`].
//!
//! Constructs the classifier does not recognize pass through unchanged; the
//! instrumenter prefers losing coverage over risking a rewrite it is not
//! sure about.

#![warn(missing_docs)]

pub mod classify;
pub mod instrument;

pub use instrument::{instrument_file, instrument_source, InstrumentError, InstrumentedSource};
