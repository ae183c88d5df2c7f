//! Streaming scan of the VCD value-change section for probe hits.

use std::collections::HashSet;
use std::io::BufRead;

use crate::VcdError;

/// Records which of the `targets` codes were ever driven to scalar `1`.
///
/// The reader starts at the beginning of the file; everything up to
/// `$enddefinitions` is skipped. In the value-change section only scalar
/// lines (`[01xXzZ]CODE`) matter for probes: timestamps (`#N`), directives
/// (`$...`) and vector changes (`b...`) are ignored. Returns as soon as
/// every target has been hit, which is what keeps multi-gigabyte dumps
/// cheap when coverage saturates early.
pub fn scan_scalar_ones<R: BufRead>(
    reader: R,
    targets: &HashSet<String>,
) -> Result<HashSet<String>, VcdError> {
    let mut hit: HashSet<String> = HashSet::new();
    if targets.is_empty() {
        return Ok(hit);
    }

    let mut in_dump = false;
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !in_dump {
            if trimmed.starts_with("$enddefinitions") {
                in_dump = true;
            }
            continue;
        }
        let first = trimmed.as_bytes()[0];
        if first == b'$' || first == b'#' {
            continue;
        }
        if !matches!(first, b'0' | b'1' | b'x' | b'X' | b'z' | b'Z') {
            continue;
        }
        if first != b'1' {
            continue;
        }
        let code = trimmed[1..].trim();
        if !targets.contains(code) || hit.contains(code) {
            continue;
        }
        hit.insert(code.to_string());
        if hit.len() == targets.len() {
            return Ok(hit);
        }
    }
    Ok(hit)
}
