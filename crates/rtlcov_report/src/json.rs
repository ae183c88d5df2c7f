//! JSON rendering of the coverage report.

use std::io;
use std::path::Path;

use crate::summary::CoverageReport;

/// Serializes the report to pretty-printed JSON.
pub fn to_json_string(report: &CoverageReport) -> io::Result<String> {
    serde_json::to_string_pretty(report).map_err(io::Error::other)
}

/// Writes the report as JSON to `path`.
pub fn write_json(report: &CoverageReport, path: &Path) -> io::Result<()> {
    std::fs::write(path, to_json_string(report)?)
}
