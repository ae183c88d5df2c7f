//! Coverage aggregation and reporting.
//!
//! Consumes the probe list from instrumentation and the hit set from the
//! VCD scan, and produces per-file summaries, a per-line status map, and
//! the console/JSON/HTML renderings.

#![warn(missing_docs)]

pub mod console;
pub mod html;
pub mod json;
pub mod line_status;
pub mod summary;

pub use console::{format_percent, write_summary};
pub use html::{escape_html, render_html, SourceListing};
pub use json::{to_json_string, write_json};
pub use line_status::{line_statuses, LineStatus};
pub use summary::{build_report, CoverageReport, FileSummary, UncoveredBranch, UncoveredLine};
