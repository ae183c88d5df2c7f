//! Physical-line classification for the instrumented Verilog subset.
//!
//! Classification happens on one line at a time after inline-comment
//! stripping, using anchored word-boundary matching. The result is a total
//! [`LineKind`]: anything not recognized is [`LineKind::Other`] and is left
//! alone by the instrumenter unless it sits where a statement belongs.

/// The recognized shape of one physical source line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// Empty after comment stripping.
    Blank,
    /// `module NAME ...`
    ModuleStart,
    /// `endmodule`
    EndModule,
    /// `always ...` or `initial ...`
    ProcHeader,
    /// Line starting with `begin`.
    Begin,
    /// Line starting with `end` (possibly `end else ...`).
    End,
    /// Line starting with `else` (possibly `else if ...`).
    Else,
    /// `if (` conditional header.
    If,
    /// `case(`, `casex(` or `casez(` header.
    Case,
    /// `endcase`
    Endcase,
    /// Strict-form case item: `LABEL :` or `LABEL : begin`, alone on the line.
    CaseItem {
        /// Whether the item opens its block on the same line.
        has_begin: bool,
    },
    /// Continuous assignment starting with `assign`.
    Assign,
    /// `for`/`while`/`repeat`/`forever` loop header.
    Loop,
    /// Anything else (generic statement, declaration, instantiation, ...).
    Other,
}

/// Classifies one line of code (comment-stripped; leading whitespace ignored).
pub fn classify(code: &str) -> LineKind {
    let s = code.trim();
    if s.is_empty() {
        return LineKind::Blank;
    }
    if starts_with_word(s, "endmodule") {
        return LineKind::EndModule;
    }
    if starts_with_word(s, "endcase") {
        return LineKind::Endcase;
    }
    if starts_with_word(s, "end") {
        return LineKind::End;
    }
    if starts_with_word(s, "begin") {
        return LineKind::Begin;
    }
    if starts_with_word(s, "else") {
        return LineKind::Else;
    }
    if is_if_header(s) {
        return LineKind::If;
    }
    if is_case_header(s) {
        return LineKind::Case;
    }
    if starts_with_word(s, "always") || starts_with_word(s, "initial") {
        return LineKind::ProcHeader;
    }
    if starts_with_word(s, "assign") {
        return LineKind::Assign;
    }
    if ["for", "while", "repeat", "forever"]
        .iter()
        .any(|kw| starts_with_word(s, kw))
    {
        return LineKind::Loop;
    }
    if starts_with_word(s, "module") && has_identifier_after(s, "module") {
        return LineKind::ModuleStart;
    }
    if let Some(has_begin) = strict_case_item(s) {
        return LineKind::CaseItem { has_begin };
    }
    LineKind::Other
}

/// Splits a line at the first `//`, returning the code part and, when
/// present, the comment tail (including the `//`).
pub fn strip_inline_comment(line: &str) -> (&str, Option<&str>) {
    match line.find("//") {
        Some(idx) => (&line[..idx], Some(&line[idx..])),
        None => (line, None),
    }
}

/// The leading whitespace of a line.
pub fn indent_of(line: &str) -> &str {
    let end = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..end]
}

/// One indentation level deeper than `indent` (tab-aware).
pub fn child_indent(indent: &str) -> String {
    if indent.contains('\t') {
        format!("{indent}\t")
    } else {
        format!("{indent}    ")
    }
}

/// Whether the line's code part ends with a `begin` token, i.e. the line
/// opens a block that a later `end` will close.
pub fn opens_block(code: &str) -> bool {
    let s = code.trim_end();
    if !s.ends_with("begin") {
        return false;
    }
    let before = &s[..s.len() - "begin".len()];
    before.is_empty() || !ends_in_word_char(before)
}

/// True when `s` starts with `kw` followed by a non-identifier character
/// (or the end of the line).
pub fn starts_with_word(s: &str, kw: &str) -> bool {
    if !s.starts_with(kw) {
        return false;
    }
    match s[kw.len()..].chars().next() {
        Some(c) => !is_word_char(c),
        None => true,
    }
}

/// Splits a loose-form case item `LABEL : rest` at the first colon.
///
/// Returns `None` when there is no colon, the label is empty, or the label
/// contains `=`, `[` or `]` (which would indicate a slice/index expression
/// or an assignment rather than a case label). `rest` comes back trimmed
/// and may be empty.
pub fn split_case_item(code: &str) -> Option<(&str, &str)> {
    let colon = code.find(':')?;
    let label = code[..colon].trim();
    if label.is_empty() {
        return None;
    }
    if label.contains('=') || label.contains('[') || label.contains(']') {
        return None;
    }
    Some((label, code[colon + 1..].trim()))
}

/// Finds the index of the `)` matching the `(` at byte index `open`.
pub fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    debug_assert_eq!(bytes.get(open), Some(&b'('));
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn ends_in_word_char(s: &str) -> bool {
    s.chars().next_back().is_some_and(is_word_char)
}

fn is_if_header(s: &str) -> bool {
    starts_with_word(s, "if") && s["if".len()..].trim_start().starts_with('(')
}

fn is_case_header(s: &str) -> bool {
    for kw in ["case", "casex", "casez"] {
        if starts_with_word(s, kw) && s[kw.len()..].trim_start().starts_with('(') {
            return true;
        }
    }
    false
}

fn has_identifier_after(s: &str, kw: &str) -> bool {
    let rest = s[kw.len()..].trim_start();
    rest.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

/// Strict-form case item: `LABEL :` or `LABEL : begin` with nothing else on
/// the line. Returns `Some(has_begin)` on a match.
fn strict_case_item(s: &str) -> Option<bool> {
    let (label, rest) = split_case_item(s)?;
    debug_assert!(!label.is_empty());
    if rest.is_empty() {
        Some(false)
    } else if rest == "begin" {
        Some(true)
    } else {
        None
    }
}
