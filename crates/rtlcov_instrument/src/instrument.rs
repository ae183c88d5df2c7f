//! The per-module instrumentation state machine.
//!
//! The input is split into top-level module chunks (`module` .. matching
//! `endmodule`); text outside modules passes through verbatim, and so does a
//! module whose `endmodule` is never found. Within a module the rewriter
//! walks physical lines, keeping just enough state to know where a probe
//! assignment is legal: block depth, case depth, a single pending branch
//! probe waiting for its `begin`, and the count of synthetic `end`s owed
//! after each `endcase`.
//!
//! Placement rules in one sentence: a probe assignment is only ever emitted
//! inside a real `begin` block, and unbraced single-statement bodies are
//! legalized first by wrapping them in a synthetic `begin … end`.

use std::path::Path;

use rtlcov_probe::{Probe, ProbeAllocator, ProbeDetail, ProbeKind};
use thiserror::Error;

use crate::classify::{
    child_indent, classify, indent_of, matching_paren, opens_block, split_case_item,
    starts_with_word, strip_inline_comment, LineKind,
};

/// Errors from file-level instrumentation.
#[derive(Debug, Error)]
pub enum InstrumentError {
    /// Reading the source or writing the instrumented output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The result of instrumenting one source file.
#[derive(Debug)]
pub struct InstrumentedSource {
    /// The rewritten source text.
    pub text: String,
    /// Probes created for this file, in allocation order.
    pub probes: Vec<Probe>,
}

/// Instruments Verilog source text, threading the global probe allocator.
pub fn instrument_source(
    source: &str,
    file: &Path,
    alloc: &mut ProbeAllocator,
) -> InstrumentedSource {
    let lines: Vec<&str> = source.lines().collect();
    let mut out: Vec<String> = Vec::new();
    let mut probes: Vec<Probe> = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let (code, _) = strip_inline_comment(lines[i]);
        if classify(code) == LineKind::ModuleStart {
            // find the matching endmodule; without one the module is left alone
            let mut j = i + 1;
            while j < lines.len() {
                let (c, _) = strip_inline_comment(lines[j]);
                if classify(c) == LineKind::EndModule {
                    break;
                }
                j += 1;
            }
            if j >= lines.len() {
                out.push(lines[i].to_string());
                i += 1;
                continue;
            }
            let rewriter = ModuleRewriter::new(&lines[i..=j], i as u32 + 1, file, alloc);
            let (chunk_out, chunk_probes) = rewriter.run();
            out.extend(chunk_out);
            probes.extend(chunk_probes);
            i = j + 1;
            continue;
        }
        out.push(lines[i].to_string());
        i += 1;
    }

    let mut text = out.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    InstrumentedSource { text, probes }
}

/// Instruments `src` into `dst`, returning the probes created.
pub fn instrument_file(
    src: &Path,
    dst: &Path,
    alloc: &mut ProbeAllocator,
) -> Result<Vec<Probe>, InstrumentError> {
    let source = std::fs::read_to_string(src)?;
    let result = instrument_source(&source, src, alloc);
    std::fs::write(dst, result.text)?;
    Ok(result.probes)
}

/// A branch probe waiting for the `begin` of its block.
#[derive(Debug)]
enum PendingProbe {
    Then(String),
    Else(String),
    CaseItem(String),
}

impl PendingProbe {
    fn name(&self) -> &str {
        match self {
            PendingProbe::Then(n) | PendingProbe::Else(n) | PendingProbe::CaseItem(n) => n,
        }
    }
}

/// Declaration keywords skipped when looking for the probe insertion point.
const DECL_KEYWORDS: &[&str] = &[
    "parameter",
    "localparam",
    "defparam",
    "input",
    "output",
    "inout",
    "reg",
    "wire",
    "integer",
    "real",
    "time",
    "genvar",
    "tri",
    "tri0",
    "tri1",
    "wand",
    "wor",
    "event",
];

struct ModuleRewriter<'a> {
    chunk: &'a [&'a str],
    start_line: u32,
    file: &'a Path,
    alloc: &'a mut ProbeAllocator,
    out: Vec<String>,
    probes: Vec<Probe>,
    probe_names: Vec<String>,
    i: usize,
    in_proc: bool,
    awaiting_begin: bool,
    awaiting_strict: bool,
    proc_indent: String,
    synth_open: bool,
    synth_indent: String,
    terminated: bool,
    continuation: bool,
    suppress_hoist: bool,
    proc_depth: usize,
    case_depth: usize,
    pending: Option<PendingProbe>,
    pending_ends: Vec<usize>,
}

impl<'a> ModuleRewriter<'a> {
    fn new(
        chunk: &'a [&'a str],
        start_line: u32,
        file: &'a Path,
        alloc: &'a mut ProbeAllocator,
    ) -> Self {
        Self {
            chunk,
            start_line,
            file,
            alloc,
            out: Vec::new(),
            probes: Vec::new(),
            probe_names: Vec::new(),
            i: 0,
            in_proc: false,
            awaiting_begin: false,
            awaiting_strict: false,
            proc_indent: String::new(),
            synth_open: false,
            synth_indent: String::new(),
            terminated: false,
            continuation: false,
            suppress_hoist: false,
            proc_depth: 0,
            case_depth: 0,
            pending: None,
            pending_ends: Vec::new(),
        }
    }

    fn run(mut self) -> (Vec<String>, Vec<Probe>) {
        let header_end = self.find_header_end();
        for k in 0..=header_end {
            self.out.push(self.chunk[k].to_string());
        }
        let decl_insert = self.find_decl_insert(header_end + 1);
        let mut decl_pos: Option<usize> = None;

        self.i = header_end + 1;
        while self.i < self.chunk.len() {
            if decl_pos.is_none() && self.i >= decl_insert {
                decl_pos = Some(self.out.len());
            }
            let raw = self.chunk[self.i];
            let (code_part, comment) = strip_inline_comment(raw);
            let code = code_part.trim();
            let indent = indent_of(raw).to_string();
            let abs = self.start_line + self.i as u32;
            let kind = classify(code);

            if self.continuation {
                self.out.push(raw.to_string());
                if code.contains(';') {
                    self.continuation = false;
                    self.terminated = true;
                }
                self.i += 1;
                self.maybe_close_synth();
                continue;
            }

            if kind == LineKind::EndModule {
                if self.synth_open {
                    let si = self.synth_indent.clone();
                    self.out.push(format!("{si}end"));
                    self.synth_open = false;
                }
                self.out.push(raw.to_string());
                self.i += 1;
                break;
            }

            if kind == LineKind::ProcHeader {
                self.proc_header(raw, code, comment, &indent, abs);
                continue;
            }

            if self.in_proc && self.awaiting_begin {
                if kind == LineKind::Begin
                    || (opens_block(code) && (self.awaiting_strict || !is_statement_start(kind)))
                {
                    self.out.push(raw.to_string());
                    let delta = net_block_delta(code);
                    if delta > 0 {
                        self.proc_depth = delta as usize;
                        self.awaiting_begin = false;
                    } else {
                        // `begin ... end` folded onto one line closed the body
                        self.exit_proc();
                    }
                    self.i += 1;
                    continue;
                }
                if self.awaiting_strict || !is_statement_start(kind) {
                    self.out.push(raw.to_string());
                    self.i += 1;
                    continue;
                }
                // single-statement procedure: open a synthetic block so probe
                // assignments have a legal home
                let si = self.proc_indent.clone();
                self.out.push(format!("{si}begin"));
                self.synth_open = true;
                self.synth_indent = si;
                self.awaiting_begin = false;
                self.proc_depth = 1;
                // fall through into the in-procedure dispatch below
            }

            if self.in_proc {
                self.proc_line(Some(raw), code, comment, &indent, abs, kind);
                self.maybe_close_synth();
                continue;
            }

            if kind == LineKind::Assign {
                self.module_assign(&indent);
                continue;
            }

            self.out.push(raw.to_string());
            self.i += 1;
        }

        // anything after endmodule inside the chunk (there is none by
        // construction, but stay total)
        while self.i < self.chunk.len() {
            self.out.push(self.chunk[self.i].to_string());
            self.i += 1;
        }

        self.splice_declarations(decl_pos.unwrap_or(header_end + 1));
        (self.out, self.probes)
    }

    // ---- per-kind handlers -------------------------------------------------

    fn proc_line(
        &mut self,
        raw: Option<&str>,
        code: &str,
        comment: Option<&str>,
        indent: &str,
        abs: u32,
        kind: LineKind,
    ) {
        match kind {
            LineKind::Blank => {
                self.push_line(raw, code, comment, indent);
                self.i += 1;
            }
            LineKind::Begin => self.begin_line(raw, code, comment, indent),
            LineKind::End => self.end_line(raw, code, comment, indent, abs),
            LineKind::Endcase => self.endcase_line(raw, code, comment, indent),
            _ if self.proc_depth == 0 => {
                self.push_line(raw, code, comment, indent);
                self.i += 1;
            }
            LineKind::Else => self.else_line(raw, code, comment, indent, abs),
            LineKind::If => self.if_chain_line(raw, code, 0, comment, indent, abs, true),
            LineKind::Case => self.case_line(raw, code, comment, indent, abs),
            LineKind::Loop => self.loop_line(raw, code, comment, indent, abs),
            LineKind::CaseItem { has_begin } if self.case_depth > 0 => {
                self.strict_case_item(raw, code, comment, indent, abs, has_begin)
            }
            _ => {
                if self.case_depth > 0 && self.inline_case_item(code, comment, indent, abs) {
                    return;
                }
                self.generic_stmt(raw, code, comment, indent, abs, kind);
            }
        }
    }

    fn begin_line(&mut self, raw: Option<&str>, code: &str, comment: Option<&str>, indent: &str) {
        self.suppress_hoist = false;
        let delta = net_block_delta(code);
        self.push_line(raw, code, comment, indent);
        if delta > 0 {
            self.proc_depth += delta as usize;
            if let Some(p) = self.pending.take() {
                let ci = child_indent(indent);
                self.push_probe_stmt(&ci, p.name().to_string());
            }
        } else {
            // `begin ... end` on one line: nowhere legal for the pending probe
            self.pending = None;
        }
        self.terminated = delta <= 0;
        self.i += 1;
    }

    fn end_line(
        &mut self,
        raw: Option<&str>,
        code: &str,
        comment: Option<&str>,
        indent: &str,
        abs: u32,
    ) {
        self.suppress_hoist = false;
        self.proc_depth = self.proc_depth.saturating_sub(1);
        let rest = code["end".len()..].trim();

        if rest.is_empty() {
            self.push_line(raw, code, comment, indent);
            self.terminated = true;
            if self.proc_depth == 0 {
                self.synth_open = false;
                self.exit_proc();
            }
            self.i += 1;
            return;
        }

        if starts_with_word(rest, "else") {
            let after = rest["else".len()..].trim();
            if let Some(if_start) = find_if_start(code) {
                // `end else if (...) ...`
                self.if_chain_line(raw, code, if_start, comment, indent, abs, false);
                return;
            }
            if after == "begin" {
                self.push_line(raw, code, comment, indent);
                self.proc_depth += 1;
                let br = self.new_probe(ProbeKind::Branch, abs, ProbeDetail::Else);
                self.pending = Some(PendingProbe::Else(br));
                self.terminated = false;
                self.i += 1;
                return;
            }
            if after.is_empty() {
                // `end else` — body on a later line
                self.branch_body_dispatch(code, comment, indent, abs, ProbeDetail::Else);
                return;
            }
            // `end else <stmt>;` on one line
            if after.ends_with(';') {
                let ci = child_indent(indent);
                self.push_opener("end else", comment, indent);
                let br = self.new_probe(ProbeKind::Branch, abs, ProbeDetail::Else);
                self.push_probe_stmt(&ci, br);
                let ln = self.new_probe(ProbeKind::Line, abs, ProbeDetail::Stmt);
                self.push_probe_stmt(&ci, ln);
                self.out.push(format!("{ci}{after}"));
                self.out.push(format!("{indent}end"));
                self.terminated = true;
                self.i += 1;
                return;
            }
            self.push_line(raw, code, comment, indent);
            self.terminated = false;
            self.i += 1;
            return;
        }

        // `end` followed by something unrecognized
        self.push_line(raw, code, comment, indent);
        self.terminated = true;
        if self.proc_depth == 0 {
            self.synth_open = false;
            self.exit_proc();
        }
        self.i += 1;
    }

    fn endcase_line(&mut self, raw: Option<&str>, code: &str, comment: Option<&str>, indent: &str) {
        self.suppress_hoist = false;
        self.case_depth = self.case_depth.saturating_sub(1);
        self.push_line(raw, code, comment, indent);
        // close the synthetic begins opened for `if/else` directly in front
        // of this case
        if let Some(slot) = self.pending_ends.get_mut(self.case_depth) {
            let owed = *slot;
            *slot = 0;
            for _ in 0..owed {
                self.out.push(format!("{indent}end"));
                self.proc_depth = self.proc_depth.saturating_sub(1);
            }
        }
        self.terminated = true;
        self.i += 1;
    }

    fn else_line(
        &mut self,
        raw: Option<&str>,
        code: &str,
        comment: Option<&str>,
        indent: &str,
        abs: u32,
    ) {
        self.suppress_hoist = false;
        let rest = code["else".len()..].trim();

        if let Some(if_start) = find_if_start(code) {
            // `else if` takes no branch probe of its own; coverage of the arm
            // is carried by the inner if's probes
            self.if_chain_line(raw, code, if_start, comment, indent, abs, false);
            return;
        }
        if opens_block(code) {
            self.push_line(raw, code, comment, indent);
            self.proc_depth += 1;
            let br = self.new_probe(ProbeKind::Branch, abs, ProbeDetail::Else);
            self.pending = Some(PendingProbe::Else(br));
            self.terminated = false;
            self.i += 1;
            return;
        }
        if rest.is_empty() {
            self.branch_body_dispatch(code, comment, indent, abs, ProbeDetail::Else);
            return;
        }
        if classify(rest) == LineKind::Case {
            // `else case (...)`: synthesize a begin, probe the arm, and owe
            // an end after the matching endcase
            self.push_opener("else", comment, indent);
            let ci = child_indent(indent);
            let br = self.new_probe(ProbeKind::Branch, abs, ProbeDetail::Else);
            self.push_probe_stmt(&ci, br);
            self.bump_pending_end();
            self.proc_depth += 1;
            self.case_line(None, rest, None, &ci, abs);
            return;
        }
        // `else <stmt>;` on one line
        if rest.ends_with(';') {
            let ci = child_indent(indent);
            self.push_opener("else", comment, indent);
            let br = self.new_probe(ProbeKind::Branch, abs, ProbeDetail::Else);
            self.push_probe_stmt(&ci, br);
            let ln = self.new_probe(ProbeKind::Line, abs, ProbeDetail::Stmt);
            self.push_probe_stmt(&ci, ln);
            self.out.push(format!("{ci}{rest}"));
            self.out.push(format!("{indent}end"));
            self.terminated = true;
            self.i += 1;
            return;
        }
        self.push_line(raw, code, comment, indent);
        self.terminated = false;
        self.i += 1;
    }

    /// Handles a line whose statement part is an `if` chain: a plain `if`,
    /// an `else if`, or an `end else if`. `if_start` is the byte offset of
    /// the `if` keyword inside `code`; everything before it is preserved as
    /// an opener prefix. `hoist` emits the line probe for the header, which
    /// is only legal when the `if` is not itself an unbraced branch body.
    #[allow(clippy::too_many_arguments)]
    fn if_chain_line(
        &mut self,
        raw: Option<&str>,
        code: &str,
        if_start: usize,
        comment: Option<&str>,
        indent: &str,
        abs: u32,
        hoist: bool,
    ) {
        let suppressed = self.suppress_hoist;
        self.suppress_hoist = false;
        if !suppressed {
            self.flush_pending(indent);
            if hoist {
                let ln = self.new_probe(ProbeKind::Line, abs, ProbeDetail::If);
                self.push_probe_stmt(indent, ln);
            }
        }

        let open = match code[if_start..].find('(') {
            Some(off) => if_start + off,
            None => {
                self.push_line(raw, code, comment, indent);
                self.terminated = false;
                self.i += 1;
                return;
            }
        };
        let close = match matching_paren(code, open) {
            Some(c) => c,
            None => {
                // condition spans physical lines: pass it through verbatim
                self.consume_unbalanced(raw, code, comment, indent, open);
                return;
            }
        };
        let tail = code[close + 1..].trim();

        if tail.is_empty() {
            self.branch_body_dispatch(code, comment, indent, abs, ProbeDetail::IfTrue);
            return;
        }
        if starts_with_word(tail, "begin") {
            self.push_line(raw, code, comment, indent);
            let delta = net_block_delta(tail);
            if delta > 0 {
                self.proc_depth += delta as usize;
                let br = self.new_probe(ProbeKind::Branch, abs, ProbeDetail::IfTrue);
                self.pending = Some(PendingProbe::Then(br));
                self.terminated = false;
            } else {
                self.terminated = true;
            }
            self.i += 1;
            return;
        }
        if classify(tail) == LineKind::Case {
            // `if (...) case (...)`: synthesize a begin around the case
            let opener = code[..close + 1].trim_end();
            self.push_opener(opener, comment, indent);
            let ci = child_indent(indent);
            let br = self.new_probe(ProbeKind::Branch, abs, ProbeDetail::IfTrue);
            self.push_probe_stmt(&ci, br);
            self.bump_pending_end();
            self.proc_depth += 1;
            self.case_line(None, tail, None, &ci, abs);
            return;
        }
        if let Some(lines) = self.rewrite_inline_chain(code, if_start, comment, indent, abs) {
            self.out.extend(lines);
            self.terminated = true;
            self.i += 1;
            return;
        }
        self.push_line(raw, code, comment, indent);
        self.terminated = tail.ends_with(';');
        self.i += 1;
    }

    fn case_line(
        &mut self,
        raw: Option<&str>,
        code: &str,
        comment: Option<&str>,
        indent: &str,
        abs: u32,
    ) {
        let suppressed = self.suppress_hoist;
        self.suppress_hoist = false;
        if !suppressed {
            self.flush_pending(indent);
            let ln = self.new_probe(ProbeKind::Line, abs, ProbeDetail::Case);
            self.push_probe_stmt(indent, ln);
        }
        self.push_line(raw, code, comment, indent);
        self.case_depth += 1;
        self.terminated = false;
        self.i += 1;
    }

    fn loop_line(
        &mut self,
        raw: Option<&str>,
        code: &str,
        comment: Option<&str>,
        indent: &str,
        abs: u32,
    ) {
        let suppressed = self.suppress_hoist;
        self.suppress_hoist = false;
        if !suppressed {
            self.flush_pending(indent);
            let ln = self.new_probe(ProbeKind::Line, abs, ProbeDetail::Stmt);
            self.push_probe_stmt(indent, ln);
        }

        if opens_block(code) {
            self.push_line(raw, code, comment, indent);
            self.proc_depth += 1;
            self.terminated = false;
            self.i += 1;
            return;
        }

        let head_end = match loop_head_end(code) {
            Some(e) => e,
            None => {
                let open = code.find('(').unwrap_or(0);
                self.consume_unbalanced(raw, code, comment, indent, open);
                return;
            }
        };
        let tail = code[head_end..].trim();

        if tail.is_empty() {
            // unbraced loop body on the next line
            match self.next_code_index(self.i + 1) {
                Some(n) => {
                    let (ncode, _, _) = self.line_at(n);
                    match classify(&ncode) {
                        LineKind::Begin => {
                            self.push_line(raw, code, comment, indent);
                            self.terminated = false;
                            self.i += 1;
                        }
                        LineKind::Other | LineKind::Assign if ncode.trim().ends_with(';') => {
                            self.wrap_next_stmt(code, comment, indent, None, n);
                        }
                        k => {
                            self.push_line(raw, code, comment, indent);
                            self.suppress_hoist =
                                matches!(k, LineKind::If | LineKind::Case | LineKind::Loop)
                                    || matches!(k, LineKind::Other | LineKind::Assign);
                            self.terminated = false;
                            self.i += 1;
                        }
                    }
                }
                None => {
                    self.push_line(raw, code, comment, indent);
                    self.terminated = false;
                    self.i += 1;
                }
            }
            return;
        }
        if starts_with_word(tail, "begin") {
            self.push_line(raw, code, comment, indent);
            let delta = net_block_delta(tail);
            if delta > 0 {
                self.proc_depth += delta as usize;
                self.terminated = false;
            } else {
                self.terminated = true;
            }
            self.i += 1;
            return;
        }
        if tail.ends_with(';') {
            // loop body on the same line
            let opener = code[..head_end].trim_end();
            let ci = child_indent(indent);
            self.push_opener(opener, comment, indent);
            let ln = self.new_probe(ProbeKind::Line, abs, ProbeDetail::Stmt);
            self.push_probe_stmt(&ci, ln);
            self.out.push(format!("{ci}{tail}"));
            self.out.push(format!("{indent}end"));
            self.terminated = true;
            self.i += 1;
            return;
        }
        self.push_line(raw, code, comment, indent);
        self.terminated = false;
        self.i += 1;
    }

    fn strict_case_item(
        &mut self,
        raw: Option<&str>,
        code: &str,
        comment: Option<&str>,
        indent: &str,
        abs: u32,
        has_begin: bool,
    ) {
        self.suppress_hoist = false;
        if has_begin {
            let br = self.new_probe(ProbeKind::Branch, abs, ProbeDetail::CaseItem);
            self.push_line(raw, code, comment, indent);
            let ci = child_indent(indent);
            self.push_probe_stmt(&ci, br);
            self.proc_depth += 1;
            self.terminated = false;
            self.i += 1;
            return;
        }
        match self.next_code_index(self.i + 1) {
            Some(n) => {
                let (ncode, ncomment, nabs) = self.line_at(n);
                match classify(&ncode) {
                    LineKind::Begin => {
                        let br = self.new_probe(ProbeKind::Branch, abs, ProbeDetail::CaseItem);
                        self.pending = Some(PendingProbe::CaseItem(br));
                        self.push_line(raw, code, comment, indent);
                        self.terminated = false;
                        self.i += 1;
                    }
                    LineKind::Other | LineKind::Assign if ncode.trim().ends_with(';') => {
                        // wrap the single statement so the probes have a block
                        self.push_line(raw, code, comment, indent);
                        let bi = child_indent(indent);
                        let ci = child_indent(&bi);
                        self.out.push(format!("{bi}begin"));
                        let br = self.new_probe(ProbeKind::Branch, abs, ProbeDetail::CaseItem);
                        self.push_probe_stmt(&ci, br);
                        let ln = self.new_probe(ProbeKind::Line, nabs, ProbeDetail::Stmt);
                        self.push_probe_stmt(&ci, ln);
                        self.push_reconstructed(&ci, ncode.trim(), ncomment);
                        self.out.push(format!("{bi}end"));
                        self.terminated = true;
                        self.i = n + 1;
                    }
                    k => {
                        self.push_line(raw, code, comment, indent);
                        self.suppress_hoist =
                            matches!(k, LineKind::If | LineKind::Case | LineKind::Loop);
                        self.terminated = false;
                        self.i += 1;
                    }
                }
            }
            None => {
                self.push_line(raw, code, comment, indent);
                self.terminated = false;
                self.i += 1;
            }
        }
    }

    /// Loose-form case item `LABEL : statement;` rewritten into a block.
    /// Returns false when the line is not a loose case item at all.
    fn inline_case_item(
        &mut self,
        code: &str,
        comment: Option<&str>,
        indent: &str,
        abs: u32,
    ) -> bool {
        let Some((label, rest)) = split_case_item(code) else {
            return false;
        };
        if label.contains('(') || label.contains('"') {
            // a call or string literal before the colon means this is a
            // statement (`$display("x: y");`), not a label
            return false;
        }
        if rest.is_empty() || starts_with_word(rest, "begin") {
            // strict form is handled by its own rule; `LABEL: begin ...`
            // one-liners are left untouched but still counted for depth
            if !rest.is_empty() {
                self.push_reconstructed(indent, code, comment);
                let delta = net_block_delta(rest);
                if delta > 0 {
                    self.proc_depth += delta as usize;
                }
                self.terminated = false;
                self.i += 1;
                return true;
            }
            return false;
        }
        if !rest.ends_with(';') {
            // the item statement continues on the next line; rewriting would
            // split it, so pass through
            self.push_reconstructed(indent, code, comment);
            self.continuation = true;
            self.terminated = false;
            self.i += 1;
            return true;
        }
        let ci = child_indent(indent);
        self.out.push(format!("{indent}{label}: begin"));
        let br = self.new_probe(ProbeKind::Branch, abs, ProbeDetail::CaseItem);
        self.push_probe_stmt(&ci, br);
        let ln = self.new_probe(ProbeKind::Line, abs, ProbeDetail::CaseItemStmt);
        self.push_probe_stmt(&ci, ln);
        self.push_reconstructed(&ci, rest, comment);
        self.out.push(format!("{indent}end"));
        self.terminated = true;
        self.i += 1;
        true
    }

    fn generic_stmt(
        &mut self,
        raw: Option<&str>,
        code: &str,
        comment: Option<&str>,
        indent: &str,
        abs: u32,
        kind: LineKind,
    ) {
        if self.suppress_hoist {
            // this line is the unbraced body of an opener we left alone;
            // probing it would change what the opener governs
            self.suppress_hoist = false;
            self.push_line(raw, code, comment, indent);
            if code.ends_with(';') {
                self.terminated = true;
            } else {
                self.continuation = true;
                self.terminated = false;
            }
            self.i += 1;
            return;
        }
        self.flush_pending(indent);
        if matches!(kind, LineKind::CaseItem { .. } | LineKind::ModuleStart) {
            // label-shaped lines outside a case and stray module keywords
            // pass through unprobed
            self.push_line(raw, code, comment, indent);
            self.terminated = false;
            self.i += 1;
            return;
        }
        let ln = self.new_probe(ProbeKind::Line, abs, ProbeDetail::Stmt);
        self.push_probe_stmt(indent, ln);
        self.push_line(raw, code, comment, indent);
        if code.ends_with(';') {
            self.terminated = true;
        } else {
            self.continuation = true;
            self.terminated = false;
        }
        self.i += 1;
    }

    // ---- procedure headers and module-scope assign -------------------------

    fn proc_header(&mut self, raw: &str, code: &str, comment: Option<&str>, indent: &str, abs: u32) {
        if self.synth_open {
            let si = self.synth_indent.clone();
            self.out.push(format!("{si}end"));
        }
        self.exit_proc();
        self.in_proc = true;
        self.awaiting_begin = true;
        self.proc_indent = indent.to_string();

        let (head_end, balanced) = proc_header_head(code);
        if !balanced {
            self.out.push(raw.to_string());
            self.awaiting_strict = true;
            self.i += 1;
            return;
        }
        let tail = code[head_end..].trim();
        if tail.is_empty() {
            self.out.push(raw.to_string());
            self.i += 1;
            return;
        }
        if starts_with_word(tail, "begin") {
            self.out.push(raw.to_string());
            let delta = net_block_delta(tail);
            if delta > 0 {
                self.proc_depth = delta as usize;
                self.awaiting_begin = false;
            } else {
                // body opened and closed on the header line
                self.exit_proc();
            }
            self.i += 1;
            return;
        }
        if !is_statement_start(classify(tail)) {
            self.out.push(raw.to_string());
            self.awaiting_strict = true;
            self.i += 1;
            return;
        }
        // statement on the header line: `always @(posedge clk) q <= d;`
        let head = code[..head_end].trim_end();
        self.push_opener(head, comment, indent);
        self.awaiting_begin = false;
        self.synth_open = true;
        self.synth_indent = indent.to_string();
        self.proc_depth = 1;
        let ci = child_indent(indent);
        let tail_owned = tail.to_string();
        let tail_kind = classify(&tail_owned);
        self.proc_line(None, &tail_owned, None, &ci, abs, tail_kind);
        self.maybe_close_synth();
    }

    fn module_assign(&mut self, indent: &str) {
        let start = self.i;
        let mut end = None;
        for k in start..self.chunk.len() {
            let (c, _) = strip_inline_comment(self.chunk[k]);
            if classify(c.trim()) == LineKind::EndModule {
                break;
            }
            if c.contains(';') {
                end = Some(k);
                break;
            }
        }
        let Some(end) = end else {
            // no terminator before endmodule; leave the text alone
            self.out.push(self.chunk[start].to_string());
            self.i += 1;
            return;
        };

        let mut names = Vec::new();
        let mut stmt = String::new();
        for k in start..=end {
            let (c, _) = strip_inline_comment(self.chunk[k]);
            if !c.trim().is_empty() {
                let ln = self.new_probe(
                    ProbeKind::Line,
                    self.start_line + k as u32,
                    ProbeDetail::Assign,
                );
                names.push(ln);
            }
            stmt.push_str(c);
            stmt.push(' ');
            self.out.push(self.chunk[k].to_string());
        }

        let idents = match stmt.find('=') {
            Some(eq) => sensitivity_idents(&stmt[eq + 1..]),
            None => Vec::new(),
        };
        let ci = child_indent(indent);
        if idents.is_empty() {
            self.out.push(format!("{indent}initial begin"));
        } else {
            self.out
                .push(format!("{indent}always @({}) begin", idents.join(" or ")));
        }
        for n in names {
            self.push_probe_stmt(&ci, n);
        }
        self.out.push(format!("{indent}end"));
        self.i = end + 1;
    }

    // ---- shared branch-body machinery --------------------------------------

    /// An opener (`if (...)`, `else`, `end else`) whose body starts on a
    /// later line: wrap a single statement, synthesize a begin before a
    /// `case`, defer the probe to a real `begin`, or give up and pass
    /// through.
    fn branch_body_dispatch(
        &mut self,
        code: &str,
        comment: Option<&str>,
        indent: &str,
        abs: u32,
        detail: ProbeDetail,
    ) {
        let Some(n) = self.next_code_index(self.i + 1) else {
            self.push_reconstructed(indent, code, comment);
            self.terminated = false;
            self.i += 1;
            return;
        };
        let (ncode, _, _) = self.line_at(n);
        match classify(&ncode) {
            LineKind::Begin => {
                let br = self.new_probe(ProbeKind::Branch, abs, detail);
                self.pending = Some(match detail {
                    ProbeDetail::Else => PendingProbe::Else(br),
                    _ => PendingProbe::Then(br),
                });
                self.push_reconstructed(indent, code, comment);
                self.terminated = false;
                self.i += 1;
            }
            LineKind::Case => {
                self.push_opener(code, comment, indent);
                let ci = child_indent(indent);
                let br = self.new_probe(ProbeKind::Branch, abs, detail);
                self.push_probe_stmt(&ci, br);
                self.bump_pending_end();
                self.proc_depth += 1;
                self.terminated = false;
                self.i += 1;
            }
            LineKind::Other | LineKind::Assign if ncode.trim().ends_with(';') => {
                self.wrap_next_stmt(code, comment, indent, Some((detail, abs)), n);
            }
            k => {
                self.push_reconstructed(indent, code, comment);
                self.suppress_hoist = matches!(
                    k,
                    LineKind::If | LineKind::Case | LineKind::Loop | LineKind::Other
                        | LineKind::Assign
                );
                self.terminated = false;
                self.i += 1;
            }
        }
    }

    /// Wraps the single-statement body at chunk index `body_idx` in a
    /// synthetic `begin ... end` under the opener line `code`.
    fn wrap_next_stmt(
        &mut self,
        code: &str,
        comment: Option<&str>,
        indent: &str,
        branch: Option<(ProbeDetail, u32)>,
        body_idx: usize,
    ) {
        self.push_opener(code, comment, indent);
        let ci = child_indent(indent);
        if let Some((detail, abs)) = branch {
            let br = self.new_probe(ProbeKind::Branch, abs, detail);
            self.push_probe_stmt(&ci, br);
        }
        let (bcode, bcomment, babs) = self.line_at(body_idx);
        let ln = self.new_probe(ProbeKind::Line, babs, ProbeDetail::Stmt);
        self.push_probe_stmt(&ci, ln);
        self.push_reconstructed(&ci, bcode.trim(), bcomment);
        self.out.push(format!("{indent}end"));
        self.terminated = true;
        self.i = body_idx + 1;
    }

    /// Rewrites a complete `if (...) stmt; [else if (...) stmt;]* [else
    /// stmt;]` chain that sits on a single physical line. Returns `None`
    /// (creating no probes) when the line does not parse as such a chain.
    fn rewrite_inline_chain(
        &mut self,
        code: &str,
        if_start: usize,
        comment: Option<&str>,
        indent: &str,
        abs: u32,
    ) -> Option<Vec<String>> {
        if code.contains('"') {
            return None;
        }
        // parse pass: collect (condition, statement) arms first so failure
        // leaves no half-allocated probes behind
        let mut arms: Vec<(Option<String>, String)> = Vec::new(); // cond None = final else
        let mut s = &code[if_start..];
        loop {
            if !starts_with_word(s, "if") {
                return None;
            }
            let open = s.find('(')?;
            if !s[..open].trim_start_matches("if").trim().is_empty() {
                return None;
            }
            let close = matching_paren(s, open)?;
            let head = &s[..=close];
            let rest = s[close + 1..].trim_start();
            if rest.is_empty() || starts_with_word(rest, "begin") {
                return None;
            }
            let semi = rest.find(';')?;
            if paren_delta(&rest[..semi]) != 0 {
                // the semicolon sits inside parentheses (a `for` header)
                return None;
            }
            arms.push((Some(head.to_string()), rest[..=semi].to_string()));
            let after = rest[semi + 1..].trim_start();
            if after.is_empty() {
                break;
            }
            if !starts_with_word(after, "else") {
                return None;
            }
            let ae = after["else".len()..].trim_start();
            if starts_with_word(ae, "if") {
                s = ae;
                continue;
            }
            let semi2 = ae.find(';')?;
            if paren_delta(&ae[..semi2]) != 0 || !ae[semi2 + 1..].trim().is_empty() {
                return None;
            }
            arms.push((None, ae[..=semi2].to_string()));
            break;
        }

        let prefix = code[..if_start].trim_end();
        let ci = child_indent(indent);
        let mut lines = Vec::new();
        for (k, (cond, stmt)) in arms.iter().enumerate() {
            let opener = match (k, cond) {
                (0, Some(c)) if prefix.is_empty() => format!("{indent}{c} begin"),
                (0, Some(c)) => format!("{indent}{prefix} {c} begin"),
                (_, Some(c)) => format!("{indent}else {c} begin"),
                (_, None) => format!("{indent}else begin"),
            };
            if k == 0 {
                if let Some(c) = comment {
                    lines.push(format!("{opener} {c}"));
                } else {
                    lines.push(opener);
                }
            } else {
                lines.push(opener);
            }
            let detail = if cond.is_some() {
                ProbeDetail::IfTrue
            } else {
                ProbeDetail::Else
            };
            let br = self.new_probe(ProbeKind::Branch, abs, detail);
            lines.push(probe_stmt(&ci, &br));
            let ln = self.new_probe(ProbeKind::Line, abs, ProbeDetail::Stmt);
            lines.push(probe_stmt(&ci, &ln));
            lines.push(format!("{ci}{}", stmt.trim()));
            lines.push(format!("{indent}end"));
        }
        Some(lines)
    }

    /// Emits the opener line plus following lines verbatim until its
    /// parenthesis (opened at `open`) balances. Used for conditions split
    /// across physical lines, which are passed through uninstrumented.
    fn consume_unbalanced(
        &mut self,
        raw: Option<&str>,
        code: &str,
        comment: Option<&str>,
        indent: &str,
        open: usize,
    ) {
        self.push_line(raw, code, comment, indent);
        let mut depth = paren_delta(&code[open..]);
        let mut block_net = 0;
        let mut k = self.i + 1;
        while k < self.chunk.len() && depth > 0 {
            let (c, _) = strip_inline_comment(self.chunk[k]);
            if classify(c.trim()) == LineKind::EndModule {
                break;
            }
            depth += paren_delta(c);
            if depth <= 0 {
                // the closing line may also open the body block
                block_net = net_block_delta(c);
            }
            self.out.push(self.chunk[k].to_string());
            k += 1;
        }
        if block_net > 0 {
            self.proc_depth += block_net as usize;
        } else {
            self.suppress_hoist = true;
        }
        self.terminated = false;
        self.i = k;
    }

    // ---- bookkeeping -------------------------------------------------------

    fn maybe_close_synth(&mut self) {
        if !(self.in_proc
            && self.synth_open
            && !self.awaiting_begin
            && self.proc_depth == 1
            && self.case_depth == 0
            && self.pending.is_none()
            && !self.continuation
            && self.terminated)
        {
            return;
        }
        if let Some(n) = self.next_code_index(self.i) {
            let (ncode, _, _) = self.line_at(n);
            // a following `else` continues the statement chain
            if classify(&ncode) == LineKind::Else {
                return;
            }
        }
        let si = self.synth_indent.clone();
        self.out.push(format!("{si}end"));
        self.synth_open = false;
        self.exit_proc();
    }

    fn exit_proc(&mut self) {
        self.in_proc = false;
        self.awaiting_begin = false;
        self.awaiting_strict = false;
        self.synth_open = false;
        self.proc_depth = 0;
        self.case_depth = 0;
        self.pending = None;
        self.pending_ends.clear();
        self.terminated = false;
        self.continuation = false;
        self.suppress_hoist = false;
    }

    fn new_probe(&mut self, kind: ProbeKind, line: u32, detail: ProbeDetail) -> String {
        let name = self.alloc.allocate(kind);
        self.probes.push(Probe {
            name: name.clone(),
            kind,
            file: self.file.to_path_buf(),
            line,
            detail,
        });
        self.probe_names.push(name.clone());
        name
    }

    fn flush_pending(&mut self, indent: &str) {
        if let Some(p) = self.pending.take() {
            let name = p.name().to_string();
            self.push_probe_stmt(indent, name);
        }
    }

    fn bump_pending_end(&mut self) {
        if self.pending_ends.len() <= self.case_depth {
            self.pending_ends.resize(self.case_depth + 1, 0);
        }
        self.pending_ends[self.case_depth] += 1;
    }

    fn push_probe_stmt(&mut self, indent: &str, name: String) {
        self.out.push(probe_stmt(indent, &name));
    }

    fn push_line(&mut self, raw: Option<&str>, code: &str, comment: Option<&str>, indent: &str) {
        match raw {
            Some(r) => self.out.push(r.to_string()),
            None => self.push_reconstructed(indent, code, comment),
        }
    }

    fn push_reconstructed(&mut self, indent: &str, code: &str, comment: Option<&str>) {
        match comment {
            Some(c) if !code.is_empty() => self.out.push(format!("{indent}{code} {c}")),
            Some(c) => self.out.push(format!("{indent}{c}")),
            None => self.out.push(format!("{indent}{code}")),
        }
    }

    fn push_opener(&mut self, code: &str, comment: Option<&str>, indent: &str) {
        match comment {
            Some(c) => self.out.push(format!("{indent}{code} begin {c}")),
            None => self.out.push(format!("{indent}{code} begin")),
        }
    }

    fn next_code_index(&self, from: usize) -> Option<usize> {
        (from..self.chunk.len()).find(|&k| {
            let (c, _) = strip_inline_comment(self.chunk[k]);
            !c.trim().is_empty()
        })
    }

    fn line_at(&self, idx: usize) -> (String, Option<&'a str>, u32) {
        let (code, comment) = strip_inline_comment(self.chunk[idx]);
        (
            code.trim().to_string(),
            comment,
            self.start_line + idx as u32,
        )
    }

    fn find_header_end(&self) -> usize {
        for (k, line) in self.chunk.iter().enumerate() {
            let (c, _) = strip_inline_comment(line);
            if c.contains(';') {
                return k;
            }
        }
        0
    }

    fn find_decl_insert(&self, from: usize) -> usize {
        let mut k = from;
        let mut continued = false;
        while k < self.chunk.len() {
            let (c, _) = strip_inline_comment(self.chunk[k]);
            let t = c.trim();
            if continued {
                if c.contains(';') {
                    continued = false;
                }
                k += 1;
                continue;
            }
            if t.is_empty() {
                k += 1;
                continue;
            }
            if DECL_KEYWORDS.iter().any(|kw| starts_with_word(t, kw)) {
                if !c.contains(';') {
                    continued = true;
                }
                k += 1;
                continue;
            }
            break;
        }
        k
    }

    fn splice_declarations(&mut self, pos: usize) {
        if self.probe_names.is_empty() {
            return;
        }
        let mod_indent = indent_of(self.chunk[0]).to_string();
        let ci = child_indent(&mod_indent);
        let mut decls: Vec<String> = Vec::new();
        for n in &self.probe_names {
            decls.push(format!("{mod_indent}reg {n};"));
        }
        decls.push(format!("{mod_indent}initial begin"));
        for n in &self.probe_names {
            decls.push(format!("{ci}{n} = 1'b0;"));
        }
        decls.push(format!("{mod_indent}end"));
        let pos = pos.min(self.out.len());
        self.out.splice(pos..pos, decls);
    }
}

// ---- free helpers ----------------------------------------------------------

fn probe_stmt(indent: &str, name: &str) -> String {
    format!("{indent}{name} = 1'b1;")
}

fn is_statement_start(kind: LineKind) -> bool {
    matches!(
        kind,
        LineKind::If | LineKind::Case | LineKind::Loop | LineKind::Other | LineKind::Assign
    )
}

/// Net `begin`/`end` token balance of one line.
fn net_block_delta(code: &str) -> i32 {
    let mut delta = 0;
    for token in word_tokens(code) {
        match token {
            "begin" => delta += 1,
            "end" => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Byte offset of an `if` keyword reachable through `end`/`else` prefixes
/// (`else if`, `end else if`), or `None`.
fn find_if_start(code: &str) -> Option<usize> {
    let mut pos = 0;
    loop {
        let s = &code[pos..];
        let t = s.trim_start();
        let off = pos + (s.len() - t.len());
        if starts_with_word(t, "if") && t["if".len()..].trim_start().starts_with('(') {
            return Some(off);
        }
        if starts_with_word(t, "end") {
            pos = off + "end".len();
        } else if starts_with_word(t, "else") {
            pos = off + "else".len();
        } else {
            return None;
        }
        if pos >= code.len() {
            return None;
        }
    }
}

/// End of a loop header: past the parenthesized group for `for`/`while`/
/// `repeat`, past the keyword for `forever`. `None` when the parenthesis
/// does not close on this line.
fn loop_head_end(code: &str) -> Option<usize> {
    if starts_with_word(code, "forever") {
        return Some("forever".len());
    }
    let open = code.find('(')?;
    matching_paren(code, open).map(|close| close + 1)
}

/// Length of the `always`/`initial` header including its event or delay
/// control, plus whether every parenthesis closed on this line.
fn proc_header_head(code: &str) -> (usize, bool) {
    let kw_len = if starts_with_word(code, "initial") {
        "initial".len()
    } else {
        "always".len()
    };
    let mut pos = kw_len;
    let bytes = code.as_bytes();
    loop {
        while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
            pos += 1;
        }
        match bytes.get(pos) {
            Some(b'@') => {
                pos += 1;
                while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
                    pos += 1;
                }
                match bytes.get(pos) {
                    Some(b'(') => match matching_paren(code, pos) {
                        Some(close) => pos = close + 1,
                        None => return (code.len(), false),
                    },
                    Some(b'*') => pos += 1,
                    _ => return (pos, true),
                }
            }
            Some(b'#') => {
                pos += 1;
                if bytes.get(pos) == Some(&b'(') {
                    match matching_paren(code, pos) {
                        Some(close) => pos = close + 1,
                        None => return (code.len(), false),
                    }
                } else {
                    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
                        pos += 1;
                    }
                }
            }
            _ => return (pos, true),
        }
    }
}

fn paren_delta(s: &str) -> i32 {
    let mut d = 0;
    for b in s.bytes() {
        match b {
            b'(' => d += 1,
            b')' => d -= 1,
            _ => {}
        }
    }
    d
}

/// Identifiers of a right-hand-side expression, in first-appearance order:
/// the sensitivity list for the synthetic block behind a continuous
/// `assign`. Based-literal tails (`4'b01`), `$`-system functions, and call
/// targets are skipped — none of them is a legal sensitivity item.
fn sensitivity_idents(rhs: &str) -> Vec<String> {
    let bytes = rhs.as_bytes();
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$')
            {
                i += 1;
            }
            let prev = if start == 0 { 0 } else { bytes[start - 1] };
            if prev == b'\'' || prev == b'$' {
                continue;
            }
            let mut j = i;
            while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
                j += 1;
            }
            if bytes.get(j) == Some(&b'(') {
                continue;
            }
            let tok = &rhs[start..i];
            if !out.iter().any(|t| t == tok) {
                out.push(tok.to_string());
            }
        } else {
            i += 1;
        }
    }
    out
}

fn word_tokens(code: &str) -> impl Iterator<Item = &str> {
    code.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests;
