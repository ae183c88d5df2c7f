//! HTML rendering: per-file header plus a colored source listing.

use std::collections::BTreeMap;
use std::path::Path;

use crate::console::format_percent;
use crate::line_status::LineStatus;
use crate::summary::CoverageReport;

/// Source text and per-line statuses for one file's listing.
#[derive(Debug)]
pub struct SourceListing {
    /// Original source text.
    pub source: String,
    /// One status per source line.
    pub statuses: Vec<LineStatus>,
}

/// Escapes text for embedding in HTML.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the full report as a standalone HTML page.
///
/// Each file gets a header with its totals and, when a listing is
/// available, a `<pre>` block with one span per source line classed
/// `cov`/`uncov`/`na` for the stylesheet to color.
pub fn render_html(report: &CoverageReport, listings: &BTreeMap<String, SourceListing>) -> String {
    let mut out = String::new();
    out.push_str(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>RTL coverage report</title>\n<style>\n\
         body { font-family: sans-serif; margin: 1em 2em; }\n\
         pre { border: 1px solid #ccc; padding: 0.5em; line-height: 1.3; }\n\
         .cov { background: #d8f5d8; }\n\
         .uncov { background: #f8d7d7; }\n\
         .na { color: #999; }\n\
         .totals { color: #555; }\n\
         </style>\n</head>\n<body>\n<h1>RTL line/branch coverage</h1>\n",
    );
    for (path, f) in &report.files {
        let name = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path);
        out.push_str(&format!("<h2>{}</h2>\n", escape_html(name)));
        out.push_str(&format!(
            "<p class=\"totals\">{} &mdash; lines {}/{} ({}), branches {}/{} ({})</p>\n",
            escape_html(path),
            f.lines_hit,
            f.lines_total,
            format_percent(f.lines_hit, f.lines_total),
            f.branches_hit,
            f.branches_total,
            format_percent(f.branches_hit, f.branches_total),
        ));
        let Some(listing) = listings.get(path) else {
            continue;
        };
        out.push_str("<pre>\n");
        for (idx, line) in listing.source.lines().enumerate() {
            let status = listing
                .statuses
                .get(idx)
                .copied()
                .unwrap_or(LineStatus::Na);
            out.push_str(&format!(
                "<span class=\"{}\">{:>5} | {}</span>\n",
                status.css_class(),
                idx + 1,
                escape_html(line),
            ));
        }
        out.push_str("</pre>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}
