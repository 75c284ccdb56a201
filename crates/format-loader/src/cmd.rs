//! TRS-80 /CMD executable decoder.
//!
//! Record-oriented binary: a type byte, a length byte (0 means 256),
//! then the payload. Type 01 is a data block whose first two payload
//! bytes are the little-endian load address; type 02 is the two-byte
//! entry point and ends the file.

use crate::{Format, LoadError, ParsedProgram, RegionBuilder, total_size};

pub(crate) fn parse(data: &[u8]) -> Result<ParsedProgram, LoadError> {
    let mut builder = RegionBuilder::new();
    let mut entry_point = None;
    let mut offset = 0;

    while offset < data.len() {
        let record_offset = offset;
        if offset + 2 > data.len() {
            return Err(LoadError::TruncatedRecord {
                offset: record_offset,
            });
        }
        let record_type = data[offset];
        let length = match data[offset + 1] {
            0 => 256,
            n => n as usize,
        };
        offset += 2;

        match record_type {
            0x01 => {
                if length < 2 {
                    return Err(LoadError::TruncatedRecord {
                        offset: record_offset,
                    });
                }
                if offset + length > data.len() {
                    return Err(LoadError::TruncatedRecord {
                        offset: record_offset,
                    });
                }
                let load = u16::from_le_bytes([data[offset], data[offset + 1]]);
                for (i, &byte) in data[offset + 2..offset + length].iter().enumerate() {
                    builder.insert(load.wrapping_add(i as u16), byte);
                }
                offset += length;
            }
            0x02 => {
                if length != 2 || offset + 2 > data.len() {
                    return Err(LoadError::TruncatedRecord {
                        offset: record_offset,
                    });
                }
                entry_point = Some(u16::from_le_bytes([data[offset], data[offset + 1]]));
                break;
            }
            other => {
                return Err(LoadError::UnknownRecordType {
                    record_type: other,
                    offset: record_offset,
                });
            }
        }
    }

    if builder.is_empty() {
        return Err(LoadError::InvalidFormat("/CMD with no data blocks"));
    }

    let regions = builder.into_regions();
    let entry_point = entry_point.or_else(|| regions.first().map(|r| r.start));
    let size_bytes = total_size(&regions);
    Ok(ParsedProgram {
        format: Format::TrsCmd,
        regions,
        entry_point,
        listing: None,
        size_bytes,
    })
}
