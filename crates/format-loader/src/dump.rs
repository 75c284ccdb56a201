//! Woz-style hex dump decoder.
//!
//! Lines look like `FF00: A9 5C 20 EF` with a three- or four-digit
//! address. `#` and `//` introduce comments, blank lines are skipped,
//! and every byte token must be exactly two hex digits.

use crate::hex::hex_digit;
use crate::{Format, LoadError, ParsedProgram, RegionBuilder, total_size};

/// True if a trimmed line opens with `HHH:` or `HHHH:`.
pub(crate) fn looks_like_dump_line(line: &str) -> bool {
    let Some(colon) = line.find(':') else {
        return false;
    };
    (3..=4).contains(&colon) && line[..colon].bytes().all(|b| hex_digit(b).is_some())
}

pub(crate) fn parse(text: &str) -> Result<ParsedProgram, LoadError> {
    let mut builder = RegionBuilder::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        let content = strip_comment(raw_line).trim();
        if content.is_empty() {
            continue;
        }

        let Some((addr_text, rest)) = content.split_once(':') else {
            return Err(LoadError::InvalidByte { line });
        };
        let addr_text = addr_text.trim();
        if !(3..=4).contains(&addr_text.len())
            || !addr_text.bytes().all(|b| hex_digit(b).is_some())
        {
            return Err(LoadError::InvalidByte { line });
        }
        let mut addr = parse_hex_u16(addr_text);

        for token in rest.split_whitespace() {
            let bytes = token.as_bytes();
            if bytes.len() != 2 {
                return Err(LoadError::InvalidByte { line });
            }
            let hi = hex_digit(bytes[0]).ok_or(LoadError::InvalidByte { line })?;
            let lo = hex_digit(bytes[1]).ok_or(LoadError::InvalidByte { line })?;
            builder.insert(addr, hi << 4 | lo);
            addr = addr.wrapping_add(1);
        }
    }

    if builder.is_empty() {
        return Err(LoadError::InvalidFormat("hex dump with no bytes"));
    }

    let regions = builder.into_regions();
    let entry_point = regions.first().map(|r| r.start);
    let size_bytes = total_size(&regions);
    Ok(ParsedProgram {
        format: Format::HexDump,
        regions,
        entry_point,
        listing: None,
        size_bytes,
    })
}

fn strip_comment(line: &str) -> &str {
    let end = line
        .find('#')
        .into_iter()
        .chain(line.find("//"))
        .min()
        .unwrap_or(line.len());
    &line[..end]
}

fn parse_hex_u16(text: &str) -> u16 {
    text.bytes()
        .fold(0u16, |acc, b| acc << 4 | u16::from(hex_digit(b).unwrap_or(0)))
}
