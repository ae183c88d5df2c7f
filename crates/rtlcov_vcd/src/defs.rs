//! VCD header (definitions section) parsing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::BufRead;

use crate::VcdError;

/// One `$var` entry from the VCD header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VcdVar {
    /// The short identifier code (e.g. `!`, `"`, `!#`).
    pub code: String,
    /// The dotted hierarchical name built from the scope stack.
    pub name: String,
    /// Bit width.
    pub width: u32,
}

/// The parsed definitions section of a VCD file.
#[derive(Debug, Default)]
pub struct VcdDefinitions {
    /// All variables, keyed by short code.
    pub vars_by_code: HashMap<String, VcdVar>,
    /// The enclosing scope (dotted, without the leaf) of each code.
    pub scope_by_code: HashMap<String, String>,
    /// Human-readable notes about malformed directives that were skipped.
    pub warnings: Vec<String>,
}

/// Streams the header until `$enddefinitions`, building the code → variable
/// mapping.
///
/// `$scope NAME` pushes onto the scope stack and `$upscope` pops it; each
/// well-formed `$var KIND WIDTH CODE REF ... $end` produces a [`VcdVar`]
/// whose name is the dotted scope plus the reference. Malformed `$var`
/// entries are skipped and recorded in [`VcdDefinitions::warnings`]; every
/// other directive is ignored.
pub fn parse_definitions<R: BufRead>(reader: R) -> Result<VcdDefinitions, VcdError> {
    let mut defs = VcdDefinitions::default();
    let mut scope_stack: Vec<String> = Vec::new();
    let mut line_num = 0usize;

    for line in reader.lines() {
        let line = line?;
        line_num += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("$scope") {
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() >= 3 {
                scope_stack.push(parts[2].to_string());
            }
            continue;
        }
        if trimmed.starts_with("$upscope") {
            scope_stack.pop();
            continue;
        }
        if trimmed.starts_with("$var") {
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() < 5 {
                defs.warnings
                    .push(format!("line {line_num}: malformed $var: {trimmed}"));
                continue;
            }
            let width: u32 = match parts[2].parse() {
                Ok(w) => w,
                Err(_) => {
                    defs.warnings.push(format!(
                        "line {line_num}: invalid width in $var: {}",
                        parts[2]
                    ));
                    continue;
                }
            };
            let code = parts[3].to_string();
            let reference = parts[4];
            let name = if scope_stack.is_empty() {
                reference.to_string()
            } else {
                format!("{}.{}", scope_stack.join("."), reference)
            };
            defs.scope_by_code
                .insert(code.clone(), scope_stack.join("."));
            defs.vars_by_code.insert(
                code.clone(),
                VcdVar {
                    code,
                    name,
                    width,
                },
            );
            continue;
        }
        if trimmed.starts_with("$enddefinitions") {
            break;
        }
    }

    Ok(defs)
}

/// Resolves probe names to VCD codes by leaf-name match.
///
/// A probe register declared at module scope shows up in the VCD under its
/// instance hierarchy; the leaf of the hierarchical name is the probe name
/// itself. Returns the `name → code` mapping plus the sorted list of probe
/// names with no VCD counterpart (usually a `$dumpvars` depth problem).
pub fn resolve_probe_codes(
    defs: &VcdDefinitions,
    probe_names: &HashSet<String>,
) -> (BTreeMap<String, String>, Vec<String>) {
    let mut code_by_name: BTreeMap<String, String> = BTreeMap::new();
    for var in defs.vars_by_code.values() {
        let leaf = var.name.rsplit('.').next().unwrap_or(&var.name);
        if probe_names.contains(leaf) {
            code_by_name.insert(leaf.to_string(), var.code.clone());
        }
    }
    let mut missing: Vec<String> = probe_names
        .iter()
        .filter(|n| !code_by_name.contains_key(*n))
        .cloned()
        .collect();
    missing.sort();
    (code_by_name, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "\
$date today $end
$version rtlcov test $end
$timescale 1ns $end
$scope module tb $end
$var wire 1 ! clk $end
$scope module uut $end
$var reg 1 \" __cov_L000001 $end
$var reg 8 # count $end
$upscope $end
$upscope $end
$enddefinitions $end
#0
0!
1\"
";

    #[test]
    fn parses_vars_with_hierarchical_names() {
        let defs = parse_definitions(Cursor::new(HEADER)).unwrap();
        assert_eq!(defs.vars_by_code.len(), 3);
        assert_eq!(defs.vars_by_code["!"].name, "tb.clk");
        assert_eq!(defs.vars_by_code["\""].name, "tb.uut.__cov_L000001");
        assert_eq!(defs.vars_by_code["#"].width, 8);
        assert!(defs.warnings.is_empty());
    }

    #[test]
    fn scope_map_tracks_enclosing_scope() {
        let defs = parse_definitions(Cursor::new(HEADER)).unwrap();
        assert_eq!(defs.scope_by_code["!"], "tb");
        assert_eq!(defs.scope_by_code["\""], "tb.uut");
    }

    #[test]
    fn stops_at_enddefinitions() {
        // the `0!` after $enddefinitions must not be parsed as a directive
        let defs = parse_definitions(Cursor::new(HEADER)).unwrap();
        assert_eq!(defs.vars_by_code.len(), 3);
    }

    #[test]
    fn var_without_scope() {
        let vcd = "$var wire 1 ! clk $end\n$enddefinitions $end\n";
        let defs = parse_definitions(Cursor::new(vcd)).unwrap();
        assert_eq!(defs.vars_by_code["!"].name, "clk");
        assert_eq!(defs.scope_by_code["!"], "");
    }

    #[test]
    fn malformed_var_skipped_with_warning() {
        let vcd = "\
$scope module tb $end
$var wire 1 $end
$var wire W ! clk $end
$var wire 1 \" rst $end
$enddefinitions $end
";
        let defs = parse_definitions(Cursor::new(vcd)).unwrap();
        assert_eq!(defs.vars_by_code.len(), 1);
        assert_eq!(defs.vars_by_code["\""].name, "tb.rst");
        assert_eq!(defs.warnings.len(), 2);
        assert!(defs.warnings[0].contains("malformed $var"));
        assert!(defs.warnings[1].contains("invalid width"));
    }

    #[test]
    fn unbalanced_upscope_is_tolerated() {
        let vcd = "\
$upscope $end
$var wire 1 ! clk $end
$enddefinitions $end
";
        let defs = parse_definitions(Cursor::new(vcd)).unwrap();
        assert_eq!(defs.vars_by_code["!"].name, "clk");
    }

    #[test]
    fn resolve_by_leaf_name() {
        let defs = parse_definitions(Cursor::new(HEADER)).unwrap();
        let probes: HashSet<String> =
            ["__cov_L000001".to_string(), "__cov_B000002".to_string()]
                .into_iter()
                .collect();
        let (codes, missing) = resolve_probe_codes(&defs, &probes);
        assert_eq!(codes.len(), 1);
        assert_eq!(codes["__cov_L000001"], "\"");
        assert_eq!(missing, vec!["__cov_B000002".to_string()]);
    }

    #[test]
    fn resolve_with_no_probes() {
        let defs = parse_definitions(Cursor::new(HEADER)).unwrap();
        let (codes, missing) = resolve_probe_codes(&defs, &HashSet::new());
        assert!(codes.is_empty());
        assert!(missing.is_empty());
    }
}
