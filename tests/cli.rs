use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::path::Path;

use unxmit::codepage::Codepage;

fn unxmit() -> assert_cmd::Command {
    cargo_bin_cmd!("unxmit").into()
}

const CP: Codepage = Codepage::Ibm1047;

// ── XMIT fixture building ────────────────────────────────

/// One framed envelope record.
fn record(flags: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= 253);
    let mut rec = vec![(payload.len() + 2) as u8, flags];
    rec.extend_from_slice(payload);
    rec
}

/// A control record: EBCDIC identifier plus whatever follows it.
fn control(id: &str, extra: &[u8]) -> Vec<u8> {
    let mut payload = CP.encode(id);
    payload.extend_from_slice(extra);
    record(0x20, &payload)
}

/// One text unit with length-prefixed value slots.
fn text_unit(id: u16, values: &[&[u8]]) -> Vec<u8> {
    let mut unit = Vec::new();
    unit.extend_from_slice(&id.to_be_bytes());
    unit.extend_from_slice(&(values.len() as u16).to_be_bytes());
    for value in values {
        unit.extend_from_slice(&(value.len() as u16).to_be_bytes());
        unit.extend_from_slice(value);
    }
    unit
}

/// Transmit one unload block payload as a run of data segments.
fn segments(payload: &[u8]) -> Vec<u8> {
    let chunks: Vec<&[u8]> = payload.chunks(200).collect();
    let mut out = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let mut flags = 0u8;
        if i == 0 {
            flags |= 0x80;
        }
        if i == chunks.len() - 1 {
            flags |= 0x40;
        }
        out.extend(record(flags, chunk));
    }
    out
}

fn padded_line(text: &str) -> Vec<u8> {
    CP.encode(&format!("{text:<80}"))
}

/// COPYR1 payload: plain PDS, RECFM FB, LRECL 80, 3390 with 15 tracks
/// per cylinder.
fn copyr1() -> Vec<u8> {
    let mut raw = vec![0u8; 56];
    raw[1..4].copy_from_slice(&[0xCA, 0x6D, 0x0F]);
    raw[4..6].copy_from_slice(&0x0200u16.to_be_bytes());
    raw[6..8].copy_from_slice(&3120u16.to_be_bytes());
    raw[8..10].copy_from_slice(&80u16.to_be_bytes());
    raw[10] = 0x90;
    raw[16..20].copy_from_slice(&[0x30, 0x50, 0x20, 0x0F]);
    raw[20..24].copy_from_slice(&32760u32.to_be_bytes());
    raw[24..26].copy_from_slice(&10u16.to_be_bytes());
    raw[26..28].copy_from_slice(&15u16.to_be_bytes());
    raw[28..30].copy_from_slice(&14u16.to_be_bytes());
    raw
}

/// COPYR2 payload: one live extent covering cylinders 0..=9.
fn copyr2() -> Vec<u8> {
    let mut raw = vec![0u8; 276];
    let extent = &mut raw[16..32];
    extent[10..12].copy_from_slice(&9u16.to_be_bytes());
    extent[12..14].copy_from_slice(&14u16.to_be_bytes());
    extent[14..16].copy_from_slice(&150u16.to_be_bytes());
    raw
}

/// Directory payload with ALPHA at TTR(0,1) and BETA at TTR(0,2).
fn directory() -> Vec<u8> {
    let mut raw = vec![0u8; 276];
    raw[12..20].copy_from_slice(&CP.encode("BETA    "));
    let mut pos = 22;
    for (name, record_no) in [("ALPHA   ", 1u8), ("BETA    ", 2u8)] {
        raw[pos..pos + 8].copy_from_slice(&CP.encode(name));
        raw[pos + 8..pos + 10].copy_from_slice(&0u16.to_be_bytes());
        raw[pos + 10] = record_no;
        raw[pos + 11] = 0x00;
        pos += 12;
    }
    raw[pos..pos + 8].copy_from_slice(&[0xFF; 8]);
    raw
}

/// A member data block payload: 12-byte header addressing the block at
/// `(cylinder 0, head 0, record_no)`, then the record bytes.
fn data_block(record_no: u8, lines: &[&str]) -> Vec<u8> {
    let mut payload = vec![0u8; 12];
    payload[8] = record_no;
    for line in lines {
        payload.extend(padded_line(line));
    }
    payload
}

/// Complete XMIT envelope around a two-member FB/80 PDS.
fn build_xmit() -> Vec<u8> {
    let mut inmr01 = Vec::new();
    inmr01.extend(text_unit(0x102F, &[&[0x01]])); // INMNUMF
    inmr01.extend(text_unit(0x1011, &[&CP.encode("MVSA")])); // INMFNODE
    inmr01.extend(text_unit(0x1012, &[&CP.encode("IBMUSER")])); // INMFUID
    inmr01.extend(text_unit(0x1024, &[&CP.encode("20240301123000")])); // INMFTIME

    let mut inmr02 = vec![0x00, 0x00, 0x00, 0x01]; // file number
    inmr02.extend(text_unit(0x1028, &[&CP.encode("IEBCOPY")])); // INMUTILN
    inmr02.extend(text_unit(0x003C, &[&[0x02, 0x00]])); // INMDSORG: PO
    inmr02.extend(text_unit(0x0049, &[&[0x90, 0x00]])); // INMRECFM: FB
    inmr02.extend(text_unit(0x0042, &[&[0x00, 0x50]])); // INMLRECL: 80
    inmr02.extend(text_unit(0x0030, &[&[0x0C, 0x30]])); // INMBLKSZ
    inmr02.extend(text_unit(0x0001, &[&CP.encode("SYSUT1")])); // INMDDNAM
    inmr02.extend(text_unit(
        0x0002,
        &[&CP.encode("IBMUSER"), &CP.encode("TEST"), &CP.encode("PDS")],
    )); // INMDSNAM

    let mut xmit = Vec::new();
    xmit.extend(control("INMR01", &inmr01));
    xmit.extend(control("INMR02", &inmr02));
    xmit.extend(segments(&copyr1()));
    xmit.extend(segments(&copyr2()));
    xmit.extend(segments(&directory()));
    xmit.extend(segments(&[0u8; 12])); // directory terminator
    xmit.extend(segments(&[0u8; 4])); // pre-data filler (12 framed bytes)
    xmit.extend(segments(&data_block(1, &["HELLO WORLD", "FROM ALPHA"])));
    xmit.extend(segments(&[0u8; 12])); // end of ALPHA
    xmit.extend(segments(&data_block(2, &["BETA LINE"])));
    xmit.extend(segments(&[0u8; 12])); // end of BETA
    xmit.extend(control("INMR06", &[]));
    xmit
}

fn write_fixture(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("input.xmi");
    std::fs::write(&path, build_xmit()).unwrap();
    path
}

// ── End-to-end scenarios ─────────────────────────────────

#[test]
fn extracts_members_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let target = dir.path().join("out");
    std::fs::create_dir(&target).unwrap();

    unxmit()
        .args(["--input", input.to_str().unwrap()])
        .args(["--target", target.to_str().unwrap()])
        .args(["--type", "txt"])
        .assert()
        .success();

    let alpha = std::fs::read_to_string(target.join("ALPHA.txt")).unwrap();
    let lines: Vec<&str> = alpha.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].trim_end(), "HELLO WORLD");
    assert_eq!(lines[1].trim_end(), "FROM ALPHA");
    assert_eq!(lines[0].len(), 80);

    let beta = std::fs::read_to_string(target.join("BETA.txt")).unwrap();
    assert_eq!(beta.lines().count(), 1);
    assert_eq!(beta.lines().next().unwrap().trim_end(), "BETA LINE");
}

#[test]
fn keeps_unload_stream_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let target = dir.path().join("out");
    std::fs::create_dir(&target).unwrap();
    let unload = dir.path().join("stream.unload");

    unxmit()
        .args(["--input", input.to_str().unwrap()])
        .args(["--target", target.to_str().unwrap()])
        .args(["--type", "txt"])
        .args(["--unload", unload.to_str().unwrap()])
        .assert()
        .success();

    let stream = std::fs::read(&unload).unwrap();
    // First block: 8-byte header + 56-byte COPYR1 payload.
    assert_eq!(&stream[0..2], &64u16.to_be_bytes());
    assert_eq!(stream[8], 0x00);
    assert_eq!(&stream[9..12], &[0xCA, 0x6D, 0x0F]);
}

#[test]
fn minimal_envelope_extracts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("minimal.xmi");
    let mut xmit = control("INMR01", &[]);
    xmit.extend(control("INMR06", &[]));
    std::fs::write(&input, xmit).unwrap();
    let target = dir.path().join("out");
    std::fs::create_dir(&target).unwrap();

    unxmit()
        .args(["--input", input.to_str().unwrap()])
        .args(["--target", target.to_str().unwrap()])
        .args(["--type", "txt"])
        .assert()
        .success();

    assert!(std::fs::read_dir(&target).unwrap().next().is_none());
}

#[test]
fn accepts_ibm037_encoding() {
    // The fixture only uses letters, digits and spaces, which occupy the
    // same positions in both codepages.
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let target = dir.path().join("out");
    std::fs::create_dir(&target).unwrap();

    unxmit()
        .args(["--input", input.to_str().unwrap()])
        .args(["--target", target.to_str().unwrap()])
        .args(["--type", "txt"])
        .args(["--encoding", "IBM-037"])
        .assert()
        .success();

    assert!(target.join("ALPHA.txt").exists());
}

// ── Exit codes ───────────────────────────────────────────

#[test]
fn missing_required_argument_exits_16() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());

    unxmit()
        .args(["--input", input.to_str().unwrap()])
        .assert()
        .code(16)
        .stderr(predicate::str::contains("--target"));
}

#[test]
fn missing_target_directory_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());

    unxmit()
        .args(["--input", input.to_str().unwrap()])
        .args(["--target", dir.path().join("absent").to_str().unwrap()])
        .args(["--type", "txt"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("target directory does not exist"));
}

#[test]
fn truncated_envelope_exits_8() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("cut.xmi");
    let mut xmit = build_xmit();
    xmit.truncate(xmit.len() / 2);
    // Drop the bytes mid-record so the reader hits a short payload.
    xmit.truncate(xmit.len() - 1);
    std::fs::write(&input, xmit).unwrap();
    let target = dir.path().join("out");
    std::fs::create_dir(&target).unwrap();

    unxmit()
        .args(["--input", input.to_str().unwrap()])
        .args(["--target", target.to_str().unwrap()])
        .args(["--type", "txt"])
        .assert()
        .code(8);
}

#[test]
fn unknown_codepage_exits_8() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let target = dir.path().join("out");
    std::fs::create_dir(&target).unwrap();

    unxmit()
        .args(["--input", input.to_str().unwrap()])
        .args(["--target", target.to_str().unwrap()])
        .args(["--type", "txt"])
        .args(["--encoding", "IBM-500"])
        .assert()
        .code(8)
        .stderr(predicate::str::contains("unknown codepage"));
}

#[test]
fn help_works() {
    unxmit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("TSO TRANSMIT"));
}
