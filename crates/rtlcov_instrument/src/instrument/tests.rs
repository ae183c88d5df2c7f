use super::*;
use rtlcov_probe::{ProbeAllocator, ProbeDetail, ProbeKind};
use std::path::Path;

fn inst(src: &str) -> InstrumentedSource {
    let mut alloc = ProbeAllocator::new();
    instrument_source(src, Path::new("/rtl/test.v"), &mut alloc)
}

/// Counts `begin`/`end` tokens over the whole output. A balanced result is
/// a necessary condition for the instrumented text to still parse.
fn block_balance(text: &str) -> (usize, usize) {
    let mut begins = 0;
    let mut ends = 0;
    for line in text.lines() {
        let (code, _) = crate::classify::strip_inline_comment(line);
        for tok in code.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$')) {
            match tok {
                "begin" => begins += 1,
                "end" => ends += 1,
                _ => {}
            }
        }
    }
    (begins, ends)
}

fn assert_balanced(text: &str) {
    let (b, e) = block_balance(text);
    assert_eq!(b, e, "unbalanced begin/end in:\n{text}");
}

fn line_index(text: &str, needle: &str) -> usize {
    text.lines()
        .position(|l| l.contains(needle))
        .unwrap_or_else(|| panic!("`{needle}` not found in:\n{text}"))
}

#[test]
fn simple_procedure_gets_line_probe() {
    let src = "\
module t (clk);
input clk;
reg q;
always @(posedge clk) begin
    q <= 1'b1;
end
endmodule
";
    let r = inst(src);
    assert_eq!(r.probes.len(), 1);
    assert_eq!(r.probes[0].kind, ProbeKind::Line);
    assert_eq!(r.probes[0].detail, ProbeDetail::Stmt);
    assert_eq!(r.probes[0].line, 5);
    assert_eq!(r.probes[0].file, Path::new("/rtl/test.v"));
    // the probe assignment sits directly before the statement
    let p = line_index(&r.text, "__cov_L000001 = 1'b1;");
    let s = line_index(&r.text, "q <= 1'b1;");
    assert_eq!(p + 1, s);
    assert_balanced(&r.text);
}

#[test]
fn declarations_inserted_after_decl_block() {
    let src = "\
module t (clk);
input clk;
parameter W = 4;
reg q;
wire [W-1:0] bus;
always @(posedge clk) begin
    q <= 1'b1;
end
endmodule
";
    let r = inst(src);
    let decl = line_index(&r.text, "reg __cov_L000001;");
    let last_user_decl = line_index(&r.text, "wire [W-1:0] bus;");
    let proc = line_index(&r.text, "always @(posedge clk)");
    assert!(decl > last_user_decl);
    assert!(decl < proc);
    // probes are zeroed in an initial block at module scope
    let init = line_index(&r.text, "__cov_L000001 = 1'b0;");
    assert!(init > decl && init < proc);
    assert_balanced(&r.text);
}

#[test]
fn bare_if_else_procedure() {
    // single-statement procedure whose statement is an if/else chain
    let src = "\
module t (a, y);
input a;
output reg y;
always @(*)
    if (a) y = 1;
    else y = 0;
endmodule
";
    let r = inst(src);
    let details: Vec<ProbeDetail> = r.probes.iter().map(|p| p.detail).collect();
    assert_eq!(
        details,
        vec![
            ProbeDetail::If,
            ProbeDetail::IfTrue,
            ProbeDetail::Stmt,
            ProbeDetail::Else,
            ProbeDetail::Stmt,
        ]
    );
    let branches = r.probes.iter().filter(|p| p.kind == ProbeKind::Branch);
    assert_eq!(branches.count(), 2);
    assert!(r.text.contains("if (a) begin"));
    assert!(r.text.contains("else begin"));
    assert_balanced(&r.text);
}

#[test]
fn if_else_on_header_line() {
    let src = "\
module t (a, y);
input a;
output reg y;
always @(*) if (a) y = 1; else y = 0;
endmodule
";
    let r = inst(src);
    assert_eq!(r.probes.len(), 5);
    assert!(r.text.contains("always @(*) begin"));
    assert!(r.text.contains("if (a) begin"));
    assert_balanced(&r.text);
}

#[test]
fn statement_on_header_line() {
    let src = "\
module t (clk, d, q);
input clk, d;
output reg q;
always @(posedge clk) q <= d;
endmodule
";
    let r = inst(src);
    assert_eq!(r.probes.len(), 1);
    assert!(r.text.contains("always @(posedge clk) begin"));
    let p = line_index(&r.text, "= 1'b1;");
    let s = line_index(&r.text, "q <= d;");
    assert_eq!(p + 1, s);
    assert_balanced(&r.text);
}

#[test]
fn end_else_begin_keeps_procedure_alive() {
    let src = "\
module t (clk, a, x, y);
input clk, a;
output reg x, y;
always @(posedge clk) begin
    if (a) begin
        x <= 1;
    end else begin
        x <= 2;
    end
    y <= 3;
end
endmodule
";
    let r = inst(src);
    // the trailing statement after the if/else must still be instrumented
    let probe_before_y = r
        .text
        .lines()
        .zip(r.text.lines().skip(1))
        .any(|(a, b)| a.contains("= 1'b1;") && b.contains("y <= 3;"));
    assert!(probe_before_y, "y <= 3 lost its probe:\n{}", r.text);
    // both arms carry branch probes
    let branch_details: Vec<ProbeDetail> = r
        .probes
        .iter()
        .filter(|p| p.kind == ProbeKind::Branch)
        .map(|p| p.detail)
        .collect();
    assert_eq!(branch_details, vec![ProbeDetail::IfTrue, ProbeDetail::Else]);
    assert_balanced(&r.text);
}

#[test]
fn if_then_case_gets_synthetic_block() {
    let src = "\
module t (en, sel, y);
input en;
input [1:0] sel;
output reg y;
always @(*) begin
    if (en)
        case (sel)
            2'b00: y = 0;
            default: y = 1;
        endcase
    else
        y = 2;
end
endmodule
";
    let r = inst(src);
    assert!(r.text.contains("if (en) begin"));
    // exactly one synthetic end directly after endcase
    let endcase = line_index(&r.text, "endcase");
    let next = r.text.lines().nth(endcase + 1).unwrap();
    assert_eq!(next.trim(), "end");
    assert_balanced(&r.text);
}

#[test]
fn else_case_chain() {
    let src = "\
module t (x, sel, y);
input x;
input [1:0] sel;
output reg y;
always @(*) begin
    if (x)
        y = 1;
    else
        case (sel)
            2'b00: y = 2;
            default: y = 3;
        endcase
end
endmodule
";
    let r = inst(src);
    assert!(r.text.contains("else begin"));
    let endcase = line_index(&r.text, "endcase");
    let next = r.text.lines().nth(endcase + 1).unwrap();
    assert_eq!(next.trim(), "end");
    // the else arm carries a branch probe placed before the case
    let else_probe = r
        .probes
        .iter()
        .find(|p| p.detail == ProbeDetail::Else)
        .expect("else branch probe");
    assert_eq!(else_probe.kind, ProbeKind::Branch);
    let probe_line = line_index(&r.text, &format!("{} = 1'b1;", else_probe.name));
    let case_line = line_index(&r.text, "case (sel)");
    assert!(probe_line < case_line);
    assert_balanced(&r.text);
}

#[test]
fn else_case_on_one_line() {
    let src = "\
module t (x, sel, y);
input x;
input [1:0] sel;
output reg y;
always @(*) begin
    if (x)
        y = 1;
    else case (sel)
        2'b00: y = 2;
        default: y = 3;
    endcase
end
endmodule
";
    let r = inst(src);
    assert!(r.text.contains("else begin"));
    let endcase = line_index(&r.text, "endcase");
    let next = r.text.lines().nth(endcase + 1).unwrap();
    assert_eq!(next.trim(), "end");
    assert_balanced(&r.text);
}

#[test]
fn inline_case_item_rewritten() {
    let src = "\
module t (sel, y);
input [1:0] sel;
output reg [3:0] y;
always @(*) begin
    case (sel)
        2'b10: y = 3; // ten
        default: y = 0;
    endcase
end
endmodule
";
    let r = inst(src);
    assert!(r.text.contains("2'b10: begin"));
    // comment survives on the rewritten body line
    assert!(r.text.contains("y = 3; // ten"));
    let item = r
        .probes
        .iter()
        .find(|p| p.detail == ProbeDetail::CaseItem)
        .unwrap();
    let stmt = r
        .probes
        .iter()
        .find(|p| p.detail == ProbeDetail::CaseItemStmt)
        .unwrap();
    assert_eq!(item.line, 6);
    assert_eq!(stmt.line, 6);
    assert_balanced(&r.text);
}

#[test]
fn strict_case_item_with_begin() {
    let src = "\
module t (sel, y);
input sel;
output reg y;
always @(*) begin
    case (sel)
        1'b0: begin
            y = 0;
        end
        default: begin
            y = 1;
        end
    endcase
end
endmodule
";
    let r = inst(src);
    // each item's branch probe is the first statement of its block
    let item_line = line_index(&r.text, "1'b0: begin");
    let probe = r.text.lines().nth(item_line + 1).unwrap();
    assert!(probe.contains("__cov_B"));
    assert_eq!(
        r.probes
            .iter()
            .filter(|p| p.detail == ProbeDetail::CaseItem)
            .count(),
        2
    );
    assert_balanced(&r.text);
}

#[test]
fn strict_case_item_unbraced_body_is_wrapped() {
    let src = "\
module t (sel, y);
input sel;
output reg y;
always @(*) begin
    case (sel)
        1'b0:
            y = 0;
        default:
            y = 1;
    endcase
end
endmodule
";
    let r = inst(src);
    // a probe directly after `1'b0:` would be a second statement in a
    // one-statement context; it must live in a synthetic block
    let item_line = line_index(&r.text, "1'b0:");
    let next = r.text.lines().nth(item_line + 1).unwrap();
    assert_eq!(next.trim(), "begin");
    assert_balanced(&r.text);
}

#[test]
fn strict_case_item_before_begin_defers_probe() {
    let src = "\
module t (sel, y);
input sel;
output reg y;
always @(*) begin
    case (sel)
        1'b0:
        begin
            y = 0;
        end
        default: y = 1;
    endcase
end
endmodule
";
    let r = inst(src);
    let begin = line_index(&r.text, "        begin");
    let probe = r.text.lines().nth(begin + 1).unwrap();
    assert!(probe.contains("__cov_B"), "probe not inside block:\n{}", r.text);
    assert_balanced(&r.text);
}

#[test]
fn continuous_assign_sensitivity_block() {
    let src = "\
module t (a, b, z);
input a, b;
output z;
assign z = a & b;
endmodule
";
    let r = inst(src);
    assert_eq!(r.probes.len(), 1);
    assert_eq!(r.probes[0].detail, ProbeDetail::Assign);
    assert_eq!(r.probes[0].line, 4);
    assert!(r.text.contains("always @(a or b) begin"));
    // original assign preserved verbatim
    assert!(r.text.contains("assign z = a & b;"));
    assert_balanced(&r.text);
}

#[test]
fn continuous_assign_constant_falls_back_to_initial() {
    let src = "\
module t (z);
output z;
assign z = 1'b0;
endmodule
";
    let r = inst(src);
    assert!(r.text.contains("initial begin"));
    assert!(!r.text.contains("always @("));
    assert_balanced(&r.text);
}

#[test]
fn continuous_assign_multi_line() {
    let src = "\
module t (a, b, z);
input a, b;
output z;
assign z = a |
           b;
endmodule
";
    let r = inst(src);
    assert_eq!(r.probes.len(), 2);
    assert!(r.probes.iter().all(|p| p.detail == ProbeDetail::Assign));
    assert_eq!(r.probes[0].line, 4);
    assert_eq!(r.probes[1].line, 5);
    assert!(r.text.contains("always @(a or b) begin"));
    assert_balanced(&r.text);
}

#[test]
fn sensitivity_skips_literals_functions_and_system_tasks() {
    let idents = sensitivity_idents("f(a) + 4'hF + $signed(b) + c");
    assert_eq!(idents, vec!["a", "b", "c"]);
    let idents = sensitivity_idents("{x, y} == 2'b01 ? x : y");
    assert_eq!(idents, vec!["x", "y"]);
    assert!(sensitivity_idents("4'b0101").is_empty());
}

#[test]
fn else_if_arm_has_no_own_branch_probe() {
    let src = "\
module t (a, b, y);
input a, b;
output reg [1:0] y;
always @(*) begin
    if (a)
        y = 1;
    else if (b)
        y = 2;
    else
        y = 3;
end
endmodule
";
    let r = inst(src);
    let branch_details: Vec<ProbeDetail> = r
        .probes
        .iter()
        .filter(|p| p.kind == ProbeKind::Branch)
        .map(|p| p.detail)
        .collect();
    // the else-if arm is covered by the inner if's if_true probe
    assert_eq!(
        branch_details,
        vec![ProbeDetail::IfTrue, ProbeDetail::IfTrue, ProbeDetail::Else]
    );
    assert!(r.text.contains("else if (b) begin"));
    // no line probe may be hoisted between `else if` and the previous arm
    let else_if = line_index(&r.text, "else if (b) begin");
    let before = r.text.lines().nth(else_if - 1).unwrap();
    assert!(!before.contains("= 1'b1;"));
    assert_balanced(&r.text);
}

#[test]
fn end_else_if_on_one_line() {
    let src = "\
module t (a, b, y);
input a, b;
output reg y;
always @(posedge a) begin
    if (a) begin
        y <= 0;
    end else if (b) begin
        y <= 1;
    end
    y <= y;
end
endmodule
";
    let r = inst(src);
    // the statement after the chain proves depth tracking survived
    let tail = line_index(&r.text, "y <= y;");
    let probe = r.text.lines().nth(tail - 1).unwrap();
    assert!(probe.contains("= 1'b1;"), "missing probe:\n{}", r.text);
    assert_balanced(&r.text);
}

#[test]
fn loop_body_is_wrapped_not_displaced() {
    let src = "\
module t (clk);
input clk;
reg [3:0] mem [0:3];
integer i;
initial begin
    for (i = 0; i < 4; i = i + 1)
        mem[i] = 0;
end
endmodule
";
    let r = inst(src);
    // the for header must open a block; a bare probe after the header would
    // become the loop body
    assert!(r.text.contains("for (i = 0; i < 4; i = i + 1) begin"));
    let hdr = line_index(&r.text, "for (i = 0");
    let inside = r.text.lines().nth(hdr + 1).unwrap();
    assert!(inside.contains("= 1'b1;"));
    assert_balanced(&r.text);
}

#[test]
fn loop_body_on_same_line() {
    let src = "\
module t (clk);
input clk;
integer i;
reg [3:0] mem [0:3];
initial begin
    for (i = 0; i < 4; i = i + 1) mem[i] = 0;
end
endmodule
";
    let r = inst(src);
    assert!(r.text.contains("for (i = 0; i < 4; i = i + 1) begin"));
    assert_balanced(&r.text);
}

#[test]
fn module_without_endmodule_passes_through() {
    let src = "\
module broken (a);
input a;
always @(*) begin
";
    let r = inst(src);
    assert!(r.probes.is_empty());
    assert_eq!(r.text, src);
}

#[test]
fn text_outside_modules_is_verbatim() {
    let src = "\
`timescale 1ns / 1ps
// top-level comment

module t (a);
input a;
endmodule

`define DONE 1
";
    let r = inst(src);
    assert!(r.text.starts_with("`timescale 1ns / 1ps\n// top-level comment\n"));
    assert!(r.text.ends_with("`define DONE 1\n"));
    assert!(r.probes.is_empty());
}

#[test]
fn two_modules_in_one_file() {
    let src = "\
module a (x);
input x;
always @(*) begin
    $display(x);
end
endmodule

module b (y);
input y;
always @(*) begin
    $display(y);
end
endmodule
";
    let r = inst(src);
    assert_eq!(r.probes.len(), 2);
    assert_eq!(r.probes[0].name, "__cov_L000001");
    assert_eq!(r.probes[1].name, "__cov_L000002");
    // each module declares only its own probe
    let decl_a = line_index(&r.text, "reg __cov_L000001;");
    let endmodule_a = line_index(&r.text, "endmodule");
    assert!(decl_a < endmodule_a);
    assert_balanced(&r.text);
}

#[test]
fn probe_numbering_continues_across_files() {
    let mut alloc = ProbeAllocator::new();
    let src = "\
module t (a);
input a;
always @(*) begin
    $display(a);
end
endmodule
";
    let r1 = instrument_source(src, Path::new("/rtl/a.v"), &mut alloc);
    let r2 = instrument_source(src, Path::new("/rtl/b.v"), &mut alloc);
    assert_eq!(r1.probes[0].name, "__cov_L000001");
    assert_eq!(r2.probes[0].name, "__cov_L000002");
    assert_eq!(r1.probes[0].file, Path::new("/rtl/a.v"));
    assert_eq!(r2.probes[0].file, Path::new("/rtl/b.v"));
}

#[test]
fn probe_lines_stay_in_bounds() {
    let src = "\
module t (a, b, sel, y, z);
input a, b;
input [1:0] sel;
output reg y;
output z;
assign z = a ^ b;
always @(*) begin
    if (a)
        y = 1;
    else
        case (sel)
            2'b00: y = 0;
            default: y = b;
        endcase
end
endmodule
";
    let line_count = src.lines().count() as u32;
    let r = inst(src);
    assert!(!r.probes.is_empty());
    for p in &r.probes {
        assert!(p.line >= 1 && p.line <= line_count, "{p:?}");
    }
    assert_balanced(&r.text);
}

#[test]
fn wrap_preserves_trailing_comment() {
    let src = "\
module t (a, y);
input a;
output reg y;
always @(*) begin
    if (a) // gate
        y = 1;
end
endmodule
";
    let r = inst(src);
    assert!(r.text.contains("if (a) begin // gate"));
    assert_balanced(&r.text);
}

#[test]
fn pending_then_probe_lands_inside_block() {
    let src = "\
module t (a, y);
input a;
output reg y;
always @(*) begin
    if (a)
    begin
        y = 1;
    end
end
endmodule
";
    let r = inst(src);
    let begin = line_index(&r.text, "    begin");
    let probe = r.text.lines().nth(begin + 1).unwrap();
    assert!(probe.contains("__cov_B"));
    assert_balanced(&r.text);
}

#[test]
fn multi_line_statement_gets_single_probe() {
    let src = "\
module t (a, b, y);
input a, b;
output reg y;
always @(*) begin
    y = a +
        b;
end
endmodule
";
    let r = inst(src);
    let line_probes = r
        .probes
        .iter()
        .filter(|p| p.kind == ProbeKind::Line)
        .count();
    assert_eq!(line_probes, 1);
    // no probe may be emitted between the two halves of the statement
    let first = line_index(&r.text, "y = a +");
    let second = r.text.lines().nth(first + 1).unwrap();
    assert!(second.contains("b;"));
    assert_balanced(&r.text);
}

#[test]
fn back_to_back_single_statement_procedures() {
    let src = "\
module t (clk, d, q, r);
input clk, d;
output reg q, r;
always @(posedge clk)
    q <= d;
always @(posedge clk)
    r <= q;
endmodule
";
    let r = inst(src);
    assert_eq!(r.probes.len(), 2);
    assert_balanced(&r.text);
    // both statements keep their probes
    for stmt in ["q <= d;", "r <= q;"] {
        let s = line_index(&r.text, stmt);
        let before = r.text.lines().nth(s - 1).unwrap();
        assert!(before.contains("= 1'b1;"), "{stmt} unprobed:\n{}", r.text);
    }
}

#[test]
fn case_as_single_procedure_statement() {
    let src = "\
module t (s, y);
input s;
output reg y;
always @(*)
    case (s)
        1'b0: y = 0;
        default: y = 1;
    endcase
endmodule
";
    let r = inst(src);
    assert_balanced(&r.text);
    assert!(r
        .probes
        .iter()
        .any(|p| p.detail == ProbeDetail::Case && p.kind == ProbeKind::Line));
    assert_eq!(
        r.probes
            .iter()
            .filter(|p| p.detail == ProbeDetail::CaseItem)
            .count(),
        2
    );
}

#[test]
fn nested_unbraced_if_body_not_displaced() {
    let src = "\
module t (a, b, y);
input a, b;
output reg y;
always @(*) begin
    if (a)
        if (b) y = 1;
end
endmodule
";
    let r = inst(src);
    // the inner if must directly follow the outer header: any probe between
    // them would replace the outer then-body
    let outer = line_index(&r.text, "if (a)");
    let next = r.text.lines().nth(outer + 1).unwrap();
    assert!(next.contains("if (b)"), "body displaced:\n{}", r.text);
    assert_balanced(&r.text);
}

#[test]
fn instrument_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("m.v");
    let dst_path = dir.path().join("m_cov.v");
    std::fs::write(
        &src_path,
        "module m (a);\ninput a;\nalways @(*) begin\n    $display(a);\nend\nendmodule\n",
    )
    .unwrap();
    let mut alloc = ProbeAllocator::new();
    let probes = instrument_file(&src_path, &dst_path, &mut alloc).unwrap();
    assert_eq!(probes.len(), 1);
    let written = std::fs::read_to_string(&dst_path).unwrap();
    assert!(written.contains("reg __cov_L000001;"));
}

#[test]
fn instrument_file_missing_source_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut alloc = ProbeAllocator::new();
    let err = instrument_file(
        Path::new("/nonexistent/x.v"),
        &dir.path().join("out.v"),
        &mut alloc,
    );
    assert!(matches!(err, Err(InstrumentError::Io(_))));
}
