//! Streaming Value Change Dump (VCD) analysis for rtlcov.
//!
//! Two passes over a VCD file, both line-streamed so multi-gigabyte dumps
//! never need to fit in memory: [`defs::parse_definitions`] reads the header
//! up to `$enddefinitions` and maps short codes to hierarchical signal
//! names, and [`scan::scan_scalar_ones`] walks the value-change section
//! recording which probe codes ever took the value `1`.
//!
//! [`toggle`] holds the optional side analysis: per-bit 0/1 toggle coverage
//! and clock-sampled instruction histograms, independent of line/branch
//! results.

#![warn(missing_docs)]

pub mod defs;
pub mod scan;
pub mod toggle;

pub use defs::{parse_definitions, resolve_probe_codes, VcdDefinitions, VcdVar};
pub use scan::scan_scalar_ones;

use thiserror::Error;

/// Errors from VCD streaming.
///
/// Malformed header directives are not errors: they are skipped and counted
/// in [`VcdDefinitions::warnings`], so a damaged `$var` never aborts a run.
#[derive(Debug, Error)]
pub enum VcdError {
    /// An I/O error occurred while reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
