//! End-to-end loader tests across format detection and decoding.

use format_loader::{DEFAULT_LOAD_ADDRESS, Format, LoadError, LoadOptions, parse};

#[test]
fn intel_hex_end_to_end() {
    let data = b":0401000001020304F1\n:00000001FF\n";
    let program = parse(data, &LoadOptions::default()).expect("valid hex");
    assert_eq!(program.format, Format::IntelHex);
    assert_eq!(program.regions.len(), 1);
    assert_eq!(program.regions[0].start, 0x0100);
    assert_eq!(program.regions[0].bytes, vec![0x01, 0x02, 0x03, 0x04]);
    assert_eq!(program.entry_point, Some(0x0100));
    assert_eq!(program.address_range().as_deref(), Some("$0100-$0103"));
}

#[test]
fn hex_dump_end_to_end() {
    let data = b"0280: A9 00 AA\n0283: 20 EF FF  # monitor entry\n";
    let program = parse(data, &LoadOptions::default()).expect("valid dump");
    assert_eq!(program.format, Format::HexDump);
    assert_eq!(program.regions.len(), 1);
    assert_eq!(program.size_bytes, 6);
}

#[test]
fn cmd_end_to_end() {
    let data = [0x01, 0x04, 0x00, 0x40, 0xC3, 0xC9, 0x02, 0x02, 0x00, 0x40];
    let program = parse(&data, &LoadOptions::default()).expect("valid /CMD");
    assert_eq!(program.format, Format::TrsCmd);
    assert_eq!(program.regions[0].start, 0x4000);
    assert_eq!(program.regions[0].bytes, vec![0xC3, 0xC9]);
    assert_eq!(program.entry_point, Some(0x4000));
}

#[test]
fn tokenized_bas_end_to_end() {
    // 10 CLS : token $84, then the end-of-program marker.
    let data = [
        0xD3, 0xD3, 0xD3, b'G', // header + filename byte
        0x0A, 0x4A, 0x0A, 0x00, 0x84, 0x00, // line 10: CLS
        0x00, 0x00, // end of program
    ];
    let program = parse(&data, &LoadOptions::default()).expect("valid BAS");
    assert_eq!(program.format, Format::TrsBas);
    assert_eq!(program.regions[0].start, 0x4A00);
    assert_eq!(program.entry_point, Some(0), "BASIC ROM keeps control");
    assert_eq!(program.listing.as_deref(), Some("10 CLS\n"));
    assert_eq!(program.size_bytes, 8);
}

#[test]
fn plain_listing_has_no_regions() {
    let data = b"10 PRINT \"HELLO\"\n20 GOTO 10\n";
    let program = parse(data, &LoadOptions::default()).expect("valid listing");
    assert_eq!(program.format, Format::BasicListing);
    assert!(program.regions.is_empty());
    assert_eq!(program.size_bytes, 0);
    assert_eq!(
        program.listing.as_deref(),
        Some("10 PRINT \"HELLO\"\n20 GOTO 10")
    );
    assert_eq!(program.address_range(), None);
}

#[test]
fn raw_binary_uses_requested_or_default_address() {
    let data = [0xA9, 0x01, 0x60];
    let program = parse(&data, &LoadOptions::default()).expect("raw");
    assert_eq!(program.format, Format::Raw);
    assert_eq!(program.regions[0].start, DEFAULT_LOAD_ADDRESS);

    let options = LoadOptions {
        load_address: Some(0x1000),
        ..Default::default()
    };
    let program = parse(&data, &options).expect("raw");
    assert_eq!(program.regions[0].start, 0x1000);
    assert_eq!(program.entry_point, Some(0x1000));
}

#[test]
fn raw_inference_matches_the_apple1_case() {
    // 1,962-byte blob: JMP $0A12 plus two ADC $0283,Y, requested $0300.
    let mut data = vec![0x4C, 0x12, 0x0A, 0x79, 0x83, 0x02, 0x79, 0x83, 0x02];
    data.resize(1962, 0xEA);
    let options = LoadOptions {
        load_address: Some(0x0300),
        ..Default::default()
    };
    let program = parse(&data, &options).expect("raw");
    assert_eq!(program.regions[0].start, 0x0280);
    assert_eq!(program.entry_point, Some(0x0280));
}

#[test]
fn forced_format_overrides_detection() {
    // This would detect as a BASIC listing; force raw instead.
    let data = b"10 PRINT \"X\"\n20 GOTO 10\n";
    let options = LoadOptions {
        format: Some(Format::Raw),
        load_address: Some(0x2000),
    };
    let program = parse(data, &options).expect("raw");
    assert_eq!(program.format, Format::Raw);
    assert_eq!(program.regions[0].start, 0x2000);
    assert_eq!(program.size_bytes, data.len());
}

#[test]
fn forced_hex_on_binary_reports_invalid_format() {
    let options = LoadOptions {
        format: Some(Format::IntelHex),
        ..Default::default()
    };
    let err = parse(&[0x00, 0x01, 0xFF, 0xFE], &options).expect_err("not text");
    assert!(matches!(err, LoadError::InvalidFormat(_)));
}

#[test]
fn regions_are_sorted_nonoverlapping_and_coalesced() {
    // Records deliberately out of order and adjacent.
    let data = b":01030000AA52\n:01000000BB44\n:01010000CC32\n:00000001FF\n";
    let program = parse(data, &LoadOptions::default()).expect("valid hex");
    assert_eq!(program.regions.len(), 2, "adjacent bytes coalesce");
    assert_eq!(program.regions[0].start, 0x0000);
    assert_eq!(program.regions[0].bytes, vec![0xBB, 0xCC]);
    assert_eq!(program.regions[1].start, 0x0003);
    let total: usize = program.regions.iter().map(|r| r.bytes.len()).sum();
    assert_eq!(program.size_bytes, total);
}
