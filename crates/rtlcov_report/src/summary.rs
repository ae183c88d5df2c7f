//! Per-file coverage summaries.

use std::collections::{BTreeMap, HashSet};

use rtlcov_probe::{Probe, ProbeDetail, ProbeKind};
use serde::Serialize;

use crate::line_status::{line_statuses, LineStatus};

/// One uncovered line entry.
#[derive(Debug, Serialize)]
pub struct UncoveredLine {
    /// 1-based line in the original source.
    pub line: u32,
    /// The probe's site tag.
    pub detail: ProbeDetail,
}

/// One uncovered branch entry.
#[derive(Debug, Serialize)]
pub struct UncoveredBranch {
    /// 1-based line in the original source.
    pub line: u32,
    /// The probe's site tag.
    pub detail: ProbeDetail,
    /// The probe register name.
    pub probe: String,
}

/// Coverage totals and uncovered lists for one source file.
#[derive(Debug, Default, Serialize)]
pub struct FileSummary {
    /// Lines carrying at least one probe.
    pub lines_total: usize,
    /// Lines where at least one probe was hit.
    pub lines_hit: usize,
    /// Branch probes total.
    pub branches_total: usize,
    /// Branch probes hit.
    pub branches_hit: usize,
    /// Line probes on lines no probe covered.
    pub uncovered_lines: Vec<UncoveredLine>,
    /// Branch probes that were never hit.
    pub uncovered_branches: Vec<UncoveredBranch>,
}

/// The whole coverage report, keyed by original file path.
#[derive(Debug, Serialize)]
pub struct CoverageReport {
    /// Per-file summaries, sorted by path.
    pub files: BTreeMap<String, FileSummary>,
}

/// Aggregates probes and the hit set into per-file summaries.
///
/// `line_counts` maps each file path (as displayed) to its original line
/// count; it drives the totality of the per-line status map. Line totals
/// are recomputed from that map — several probes on one line count once —
/// while branch totals stay probe-based.
pub fn build_report(
    probes: &[Probe],
    hit: &HashSet<String>,
    line_counts: &BTreeMap<String, usize>,
) -> CoverageReport {
    let mut by_file: BTreeMap<String, Vec<&Probe>> = BTreeMap::new();
    for p in probes {
        by_file.entry(p.file.display().to_string()).or_default().push(p);
    }

    let mut files = BTreeMap::new();
    for (path, file_probes) in by_file {
        let line_count = line_counts.get(&path).copied().unwrap_or_else(|| {
            file_probes.iter().map(|p| p.line as usize).max().unwrap_or(0)
        });
        let statuses = line_statuses(file_probes.iter().copied(), hit, line_count);

        let mut summary = FileSummary {
            lines_total: statuses.iter().filter(|&&s| s != LineStatus::Na).count(),
            lines_hit: statuses.iter().filter(|&&s| s == LineStatus::Cov).count(),
            ..FileSummary::default()
        };
        for p in &file_probes {
            let is_hit = hit.contains(&p.name);
            match p.kind {
                ProbeKind::Line => {
                    let status = statuses
                        .get(p.line.saturating_sub(1) as usize)
                        .copied()
                        .unwrap_or(LineStatus::Na);
                    if status == LineStatus::Uncov {
                        summary.uncovered_lines.push(UncoveredLine {
                            line: p.line,
                            detail: p.detail,
                        });
                    }
                }
                ProbeKind::Branch => {
                    summary.branches_total += 1;
                    if is_hit {
                        summary.branches_hit += 1;
                    } else {
                        summary.uncovered_branches.push(UncoveredBranch {
                            line: p.line,
                            detail: p.detail,
                            probe: p.name.clone(),
                        });
                    }
                }
            }
        }
        files.insert(path, summary);
    }
    CoverageReport { files }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn probe(name: &str, kind: ProbeKind, line: u32, detail: ProbeDetail) -> Probe {
        Probe {
            name: name.to_string(),
            kind,
            file: Path::new("/rtl/alu.v").to_path_buf(),
            line,
            detail,
        }
    }

    fn fixture() -> (Vec<Probe>, HashSet<String>, BTreeMap<String, usize>) {
        let probes = vec![
            probe("__cov_L000001", ProbeKind::Line, 2, ProbeDetail::If),
            probe("__cov_B000002", ProbeKind::Branch, 2, ProbeDetail::IfTrue),
            probe("__cov_L000003", ProbeKind::Line, 3, ProbeDetail::Stmt),
            probe("__cov_B000004", ProbeKind::Branch, 4, ProbeDetail::Else),
            probe("__cov_L000005", ProbeKind::Line, 5, ProbeDetail::Stmt),
        ];
        let hit: HashSet<String> = ["__cov_L000001", "__cov_B000002", "__cov_L000003"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut counts = BTreeMap::new();
        counts.insert("/rtl/alu.v".to_string(), 6);
        (probes, hit, counts)
    }

    #[test]
    fn totals_from_status_map() {
        let (probes, hit, counts) = fixture();
        let report = build_report(&probes, &hit, &counts);
        let f = &report.files["/rtl/alu.v"];
        // lines 2, 3, 4, 5 carry probes; 2 and 3 are covered
        assert_eq!(f.lines_total, 4);
        assert_eq!(f.lines_hit, 2);
        assert_eq!(f.branches_total, 2);
        assert_eq!(f.branches_hit, 1);
    }

    #[test]
    fn hit_counts_bounded_by_totals() {
        let (probes, hit, counts) = fixture();
        let report = build_report(&probes, &hit, &counts);
        for f in report.files.values() {
            assert!(f.lines_hit <= f.lines_total);
            assert!(f.branches_hit <= f.branches_total);
        }
    }

    #[test]
    fn uncovered_lists_contents() {
        let (probes, hit, counts) = fixture();
        let report = build_report(&probes, &hit, &counts);
        let f = &report.files["/rtl/alu.v"];
        assert_eq!(f.uncovered_lines.len(), 1);
        assert_eq!(f.uncovered_lines[0].line, 5);
        assert_eq!(f.uncovered_branches.len(), 1);
        assert_eq!(f.uncovered_branches[0].probe, "__cov_B000004");
        assert_eq!(f.uncovered_branches[0].detail, ProbeDetail::Else);
    }

    #[test]
    fn covered_line_never_listed_uncovered() {
        // two probes on one line, one hit: the line is covered and its
        // unhit line probe must not appear in uncovered_lines
        let probes = vec![
            probe("__cov_L000001", ProbeKind::Line, 1, ProbeDetail::Stmt),
            probe("__cov_L000002", ProbeKind::Line, 1, ProbeDetail::Stmt),
        ];
        let hit: HashSet<String> = ["__cov_L000001".to_string()].into_iter().collect();
        let mut counts = BTreeMap::new();
        counts.insert("/rtl/alu.v".to_string(), 1);
        let report = build_report(&probes, &hit, &counts);
        let f = &report.files["/rtl/alu.v"];
        assert!(f.uncovered_lines.is_empty());
        assert_eq!(f.lines_total, 1);
        assert_eq!(f.lines_hit, 1);
    }

    #[test]
    fn files_grouped_and_sorted() {
        let mut probes = vec![probe("__cov_L000001", ProbeKind::Line, 1, ProbeDetail::Stmt)];
        probes.push(Probe {
            name: "__cov_L000002".to_string(),
            kind: ProbeKind::Line,
            file: Path::new("/rtl/adder.v").to_path_buf(),
            line: 1,
            detail: ProbeDetail::Stmt,
        });
        let report = build_report(&probes, &HashSet::new(), &BTreeMap::new());
        let keys: Vec<&String> = report.files.keys().collect();
        assert_eq!(keys, vec!["/rtl/adder.v", "/rtl/alu.v"]);
    }

    #[test]
    fn missing_line_count_falls_back_to_max_probe_line() {
        let probes = vec![probe("__cov_L000001", ProbeKind::Line, 7, ProbeDetail::Stmt)];
        let report = build_report(&probes, &HashSet::new(), &BTreeMap::new());
        let f = &report.files["/rtl/alu.v"];
        assert_eq!(f.lines_total, 1);
        assert_eq!(f.uncovered_lines[0].line, 7);
    }

    #[test]
    fn json_schema_shape() {
        let (probes, hit, counts) = fixture();
        let report = build_report(&probes, &hit, &counts);
        let v = serde_json::to_value(&report).unwrap();
        let f = &v["files"]["/rtl/alu.v"];
        assert!(f["lines_total"].is_number());
        assert!(f["uncovered_lines"].is_array());
        assert_eq!(f["uncovered_lines"][0]["detail"], "stmt");
        assert_eq!(f["uncovered_branches"][0]["probe"], "__cov_B000004");
        assert_eq!(f["uncovered_branches"][0]["detail"], "else");
    }
}
