//! Exerciser transcript parsing.
//!
//! ZEXDOC/ZEXALL/8080EX1 print one line per instruction group:
//!
//! ```text
//! <adc,sbc> hl,<bc,de,hl,sp>....  OK
//! add hl,<bc,de,hl,sp>......  ERROR **** crc expected:f39089a0 found:12345678
//! ```
//!
//! A dotted line ending in OK is a pass; a line carrying the CRC error
//! shape is a failure with both checksums extracted. The banner line
//! naming the exerciser also contains dots and is skipped. Everything
//! else (preflight notes, the final summary) is ignored.

use serde::Serialize;

/// One instruction group's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestGroup {
    /// Group name as printed, without the dots and verdict.
    pub name: String,
    pub passed: bool,
    /// The raw transcript line.
    pub line: String,
    pub expected_crc: Option<String>,
    pub actual_crc: Option<String>,
}

/// Parse an exerciser transcript into group verdicts.
#[must_use]
pub fn parse_transcript(output: &str) -> Vec<TestGroup> {
    let mut groups = Vec::new();

    for raw_line in output.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((expected, actual)) = extract_crcs(line) {
            if line.contains("ERROR") {
                groups.push(TestGroup {
                    name: group_name(line),
                    passed: false,
                    line: line.to_string(),
                    expected_crc: Some(expected),
                    actual_crc: Some(actual),
                });
                continue;
            }
        }

        if line.ends_with("OK") && line.contains('.') && !line.to_lowercase().contains("exerciser")
        {
            groups.push(TestGroup {
                name: group_name(line),
                passed: true,
                line: line.to_string(),
                expected_crc: None,
                actual_crc: None,
            });
        }
    }

    groups
}

/// The group name is the line with trailing dots and verdict stripped.
fn group_name(line: &str) -> String {
    let head = line
        .split("ERROR")
        .next()
        .unwrap_or(line)
        .trim_end_matches("OK")
        .trim_end();
    head.trim_end_matches('.').trim().to_string()
}

/// Pull `crc expected:XXXXXXXX found:XXXXXXXX` out of a line.
fn extract_crcs(line: &str) -> Option<(String, String)> {
    let expected = hex_after(line, "expected:")?;
    let actual = hex_after(line, "found:")?;
    Some((expected, actual))
}

fn hex_after(line: &str, marker: &str) -> Option<String> {
    let start = line.find(marker)? + marker.len();
    let hex: String = line[start..]
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect();
    if hex.len() == 8 { Some(hex) } else { None }
}
