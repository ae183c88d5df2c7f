//! Probe records and the global probe-name allocator.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Whether a probe measures line execution or branch-arm execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Attached to one executable source line.
    Line,
    /// Attached to one arm of a conditional or to one case item.
    Branch,
}

/// The syntactic site a probe is attached to.
///
/// `Endcase` is part of the tag vocabulary for schema completeness but is
/// never produced: Verilog does not allow a statement between the last case
/// item and `endcase`, so there is no legal probe site there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeDetail {
    /// A generic procedural statement.
    Stmt,
    /// An `if (...)` header line.
    If,
    /// A `case`/`casex`/`casez` header line.
    Case,
    /// A physical line of a continuous `assign`.
    Assign,
    /// The taken arm of an `if`.
    IfTrue,
    /// The `else` arm of an `if`.
    Else,
    /// One case item (label).
    CaseItem,
    /// The single statement of an inline case item.
    CaseItemStmt,
    /// Reserved; see the enum-level docs.
    Endcase,
}

impl ProbeDetail {
    /// The snake_case tag used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeDetail::Stmt => "stmt",
            ProbeDetail::If => "if",
            ProbeDetail::Case => "case",
            ProbeDetail::Assign => "assign",
            ProbeDetail::IfTrue => "if_true",
            ProbeDetail::Else => "else",
            ProbeDetail::CaseItem => "case_item",
            ProbeDetail::CaseItemStmt => "case_item_stmt",
            ProbeDetail::Endcase => "endcase",
        }
    }
}

impl fmt::Display for ProbeDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instrumentation site: a synthesized 1-bit register and where it came
/// from in the original source.
#[derive(Clone, Debug, Serialize)]
pub struct Probe {
    /// The Verilog register name (`__cov_L000042` / `__cov_B000043`).
    pub name: String,
    /// Line or branch probe.
    pub kind: ProbeKind,
    /// Path of the original (un-instrumented) source file.
    pub file: PathBuf,
    /// 1-based line number in the original source.
    pub line: u32,
    /// The syntactic site tag.
    pub detail: ProbeDetail,
}

/// Hands out globally unique probe names.
///
/// The counter is monotonic across every file of a run; it is threaded
/// `&mut` through per-file instrumentation so names never collide even
/// though each file is instrumented independently.
#[derive(Debug, Default)]
pub struct ProbeAllocator {
    next_id: u32,
}

impl ProbeAllocator {
    /// Creates an allocator starting at id 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next probe name for the given kind.
    ///
    /// Names have the form `__cov_L######` for line probes and
    /// `__cov_B######` for branch probes; the first allocated id is 1.
    pub fn allocate(&mut self, kind: ProbeKind) -> String {
        self.next_id += 1;
        let tag = match kind {
            ProbeKind::Line => 'L',
            ProbeKind::Branch => 'B',
        };
        format!("__cov_{tag}{:06}", self.next_id)
    }

    /// The number of names allocated so far.
    pub fn issued(&self) -> u32 {
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn allocate_line_and_branch_names() {
        let mut alloc = ProbeAllocator::new();
        assert_eq!(alloc.allocate(ProbeKind::Line), "__cov_L000001");
        assert_eq!(alloc.allocate(ProbeKind::Branch), "__cov_B000002");
        assert_eq!(alloc.allocate(ProbeKind::Line), "__cov_L000003");
        assert_eq!(alloc.issued(), 3);
    }

    #[test]
    fn names_are_unique_across_kinds() {
        let mut alloc = ProbeAllocator::new();
        let mut seen = std::collections::HashSet::new();
        for i in 0..200 {
            let kind = if i % 2 == 0 {
                ProbeKind::Line
            } else {
                ProbeKind::Branch
            };
            assert!(seen.insert(alloc.allocate(kind)));
        }
    }

    #[test]
    fn names_are_legal_verilog_identifiers() {
        let mut alloc = ProbeAllocator::new();
        let name = alloc.allocate(ProbeKind::Branch);
        let mut chars = name.chars();
        let first = chars.next().unwrap();
        assert!(first == '_' || first.is_ascii_alphabetic());
        assert!(chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric()));
    }

    #[test]
    fn detail_display_matches_serde_tag() {
        let details = [
            ProbeDetail::Stmt,
            ProbeDetail::If,
            ProbeDetail::Case,
            ProbeDetail::Assign,
            ProbeDetail::IfTrue,
            ProbeDetail::Else,
            ProbeDetail::CaseItem,
            ProbeDetail::CaseItemStmt,
            ProbeDetail::Endcase,
        ];
        for d in details {
            let json = serde_json::to_string(&d).unwrap();
            assert_eq!(json, format!("\"{d}\""));
        }
    }

    #[test]
    fn probe_serializes_with_snake_case_detail() {
        let probe = Probe {
            name: "__cov_B000007".to_string(),
            kind: ProbeKind::Branch,
            file: Path::new("/rtl/alu.v").to_path_buf(),
            line: 42,
            detail: ProbeDetail::IfTrue,
        };
        let json = serde_json::to_value(&probe).unwrap();
        assert_eq!(json["kind"], "branch");
        assert_eq!(json["detail"], "if_true");
        assert_eq!(json["line"], 42);
    }
}
