// SPDX-License-Identifier: BSD-3-Clause

use std::fs;
use std::path::PathBuf;

use pdp11obj::{blocktype, cli, gsdtype, Rad50Name};

/// Builds one formatted binary block with a valid checksum.
fn block(block_type: u16, payload: &[u8]) -> Vec<u8> {
    let length = (payload.len() + 6) as u16;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&length.to_le_bytes());
    bytes.extend_from_slice(&block_type.to_le_bytes());
    bytes.extend_from_slice(payload);
    let sum = bytes.iter().fold(0u8, |a, b| a.wrapping_add(*b));
    bytes.push(sum.wrapping_neg());
    bytes
}

fn gsd_record(name: &str, flags: u8, kind: u8, argument: u16) -> Vec<u8> {
    let name = Rad50Name::encode(name).unwrap();
    let mut bytes = Vec::new();
    for w in name.words() {
        bytes.extend_from_slice(&w.to_le_bytes());
    }
    bytes.push(flags);
    bytes.push(kind);
    bytes.extend_from_slice(&argument.to_le_bytes());
    bytes
}

fn write_object(dir: &tempfile::TempDir, name: &str, image: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, image).unwrap();
    path
}

#[test]
fn test_dump_full_module() {
    let mut payload = gsd_record("MYPROG", 0, gsdtype::MODULE_NAME, 0);
    payload.extend(gsd_record("START", 0o50, gsdtype::GLOBAL_SYMBOL, 0));

    let mut image = block(blocktype::GSD, &payload);
    let mut txt = Vec::new();
    for w in [0o1000u16, 0o12737, 0o000001] {
        txt.extend_from_slice(&w.to_le_bytes());
    }
    image.extend(block(blocktype::TXT, &txt));
    let mut rld = (0o1u16 | (0o20 << 8)).to_le_bytes().to_vec();
    rld.extend_from_slice(&0o52u16.to_le_bytes());
    image.extend(block(blocktype::RLD, &rld));
    image.extend(block(blocktype::ENDMOD, &[]));

    let dir = tempfile::tempdir().unwrap();
    let path = write_object(&dir, "MYPROG.OBJ", &image);

    let mut out: Vec<u8> = Vec::new();
    cli::dump(&mut out, &path).unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "000000 | Length 000026 Type 000001 GSD\n\
         000006 |  GSD Module Name [MYPROG]\n\
         000016 |  GSD Global Symbol [START ] REL+DEF\n\
         000027 | Length 000014 Type 000003 TXT\n\
         000035 |  Load Address 001000\n\
         000037 |  012737 000001\n\
         000044 | Length 000012 Type 000004 RLD\n\
         000052 |  RLD Internal Relocation Constant 000052 Target 000053\n\
         000057 | Length 000006 Type 000006 ENDMOD\n"
    );
}

#[test]
fn test_dump_reports_diagnostics_without_failing() {
    // an ENDMOD block followed by a lone sentinel word
    let mut image = block(blocktype::ENDMOD, &[]);
    image.extend_from_slice(&[0x01, 0x00]);

    let dir = tempfile::tempdir().unwrap();
    let path = write_object(&dir, "BAD.OBJ", &image);

    let mut out: Vec<u8> = Vec::new();
    cli::dump(&mut out, &path).unwrap();

    let dump = String::from_utf8(out).unwrap();
    assert!(dump.contains("Type 000006 ENDMOD"));
    assert!(dump.ends_with("?OBJ - Block at 000007 has a truncated header.\n"));
}

#[test]
fn test_dump_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("NOFILE.OBJ");

    let mut out: Vec<u8> = Vec::new();
    let err = cli::dump(&mut out, &path).unwrap_err();
    assert!(err.to_string().contains("could not read"));
    assert!(out.is_empty());
}

#[test]
fn test_dump_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_object(&dir, "EMPTY.OBJ", &[]);

    let mut out: Vec<u8> = Vec::new();
    let err = cli::dump(&mut out, &path).unwrap_err();
    assert!(err.to_string().contains("is empty"));
    assert!(out.is_empty());
}
