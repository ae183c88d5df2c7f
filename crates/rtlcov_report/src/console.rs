//! Console rendering of the coverage summary.

use std::io::{self, Write};
use std::path::Path;

use crate::summary::CoverageReport;

/// Formats `num/den` as a percentage, or `n/a` when the denominator is 0.
pub fn format_percent(num: usize, den: usize) -> String {
    if den == 0 {
        "n/a".to_string()
    } else {
        format!("{:.2}%", 100.0 * num as f64 / den as f64)
    }
}

/// Writes the per-file summary and the uncovered listings.
///
/// `top_uncovered` bounds how many uncovered lines and how many uncovered
/// branches are listed per file; the JSON report stays unbounded.
pub fn write_summary<W: Write>(
    w: &mut W,
    report: &CoverageReport,
    top_uncovered: usize,
) -> io::Result<()> {
    writeln!(w, "=================================================================")?;
    writeln!(w, "RTL line/branch coverage")?;
    writeln!(w, "=================================================================")?;
    for (path, f) in &report.files {
        writeln!(
            w,
            "- {}: lines {}/{} ({}), branches {}/{} ({})",
            file_name(path),
            f.lines_hit,
            f.lines_total,
            format_percent(f.lines_hit, f.lines_total),
            f.branches_hit,
            f.branches_total,
            format_percent(f.branches_hit, f.branches_total),
        )?;
    }
    writeln!(w)?;
    writeln!(w, "Uncovered (per file):")?;
    for (path, f) in &report.files {
        if f.uncovered_lines.is_empty() && f.uncovered_branches.is_empty() {
            continue;
        }
        writeln!(w, "- {}", file_name(path))?;
        for item in f.uncovered_lines.iter().take(top_uncovered) {
            writeln!(w, "  line {}: {}", item.line, item.detail)?;
        }
        for item in f.uncovered_branches.iter().take(top_uncovered) {
            writeln!(w, "  branch line {}: {}", item.line, item.detail)?;
        }
    }
    Ok(())
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}
