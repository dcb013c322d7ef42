use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;

const SYNC: u16 = 0x6B21;
const FER: u16 = 0x6B20;
const ONE: u16 = 0x0081;
const ZERO: u16 = 0x007F;

fn g192(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn words(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|p| u16::from_le_bytes([p[0], p[1]]))
        .collect()
}

/// Three 4-bit frames for layers {2, 4}.
fn write_input(path: &Path) {
    let mut w = Vec::new();
    for bits in [[ONE, ZERO, ONE, ONE], [ZERO, ZERO, ONE, ZERO], [ONE, ONE, ZERO, ONE]] {
        w.extend([SYNC, 4]);
        w.extend(bits);
    }
    fs::write(path, g192(&w)).unwrap();
}

fn path_str(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[test]
fn layered_run_truncates_and_reports_json() {
    let exe = env!("CARGO_BIN_EXE_eid-ev");
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.g192");
    let ep0 = dir.path().join("ep0.g192");
    let ep1 = dir.path().join("ep1.g192");
    let out = dir.path().join("out.g192");
    write_input(&input);
    fs::write(&ep0, g192(&[SYNC, SYNC, FER])).unwrap();
    fs::write(&ep1, g192(&[FER, SYNC, SYNC])).unwrap();

    let output = Command::new(exe)
        .args([
            "--layers",
            "2,4",
            "--json",
            "-q",
            path_str(&input),
            path_str(&ep0),
            path_str(&ep1),
            path_str(&out),
        ])
        .output()
        .expect("run failed");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let written = words(&fs::read(&out).unwrap());
    assert_eq!(written, vec![SYNC, 2, ONE, ZERO, SYNC, 4, ZERO, ZERO, ONE, ZERO, FER, 0]);

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["processed"].as_u64().unwrap(), 3);
    assert_eq!(json["disturbed"].as_u64().unwrap(), 2);
    assert_eq!(json["bits_out"].as_u64().unwrap(), 6);
    assert_eq!(json["layers"][0]["applied"].as_u64().unwrap(), 1);
    assert_eq!(json["layers"][1]["applied"].as_u64().unwrap(), 2);
    assert_eq!(json["layers"][1]["cumulative"].as_u64().unwrap(), 2);
    assert_eq!(json["run"]["mode"].as_str().unwrap(), "layered");
}

#[test]
fn individual_mode_blanks_and_converts_to_byte_output() {
    let exe = env!("CARGO_BIN_EXE_eid-ev");
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.g192");
    let out = dir.path().join("out.byte");
    fs::write(&input, g192(&[SYNC, 6, ONE, ONE, ONE, ONE, ONE, ONE])).unwrap();
    let eps: Vec<_> = [0x21u8, 0x20, 0x21]
        .iter()
        .enumerate()
        .map(|(i, tag)| {
            let p = dir.path().join(format!("ep{i}.byte"));
            fs::write(&p, [*tag]).unwrap();
            p
        })
        .collect();

    let status = Command::new(exe)
        .args(["--layers", "2,4,6", "--ind", "--obs", "byte", "-q", path_str(&input)])
        .args(eps.iter().map(|p| path_str(p)))
        .arg(path_str(&out))
        .status()
        .expect("run failed");
    assert!(status.success());
    assert_eq!(fs::read(&out).unwrap(), vec![0x20, 6, 0x81, 0x81, 0x00, 0x00, 0x81, 0x81]);
}

#[test]
fn report_goes_to_stderr_unless_quiet() {
    let exe = env!("CARGO_BIN_EXE_eid-ev");
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.g192");
    let ep0 = dir.path().join("ep0.g192");
    let ep1 = dir.path().join("ep1.g192");
    let out = dir.path().join("out.g192");
    write_input(&input);
    fs::write(&ep0, g192(&[SYNC])).unwrap();
    fs::write(&ep1, g192(&[SYNC])).unwrap();

    let output = Command::new(exe)
        .args([
            "--layers",
            "2,4",
            path_str(&input),
            path_str(&ep0),
            path_str(&ep1),
            path_str(&out),
        ])
        .output()
        .expect("run failed");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Processed frames"));
    assert!(stderr.contains("wrapped .......... : 2 times"));
    assert_eq!(fs::read(&out).unwrap(), fs::read(&input).unwrap());
}

#[test]
fn bs_summary_counts_frames() {
    let exe = env!("CARGO_BIN_EXE_bs_summary");
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.g192");
    let mut w = vec![SYNC, 2, ONE, ONE, FER, 0, SYNC, 0, SYNC, 3, ONE, ONE, ONE];
    w.extend([SYNC, 4, ONE, 0, ONE, ONE]);
    fs::write(&input, g192(&w)).unwrap();

    let output = Command::new(exe)
        .args([path_str(&input), "--layers", "2,4", "--json"])
        .output()
        .expect("run failed");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["frames"].as_u64().unwrap(), 5);
    assert_eq!(json["fer"].as_u64().unwrap(), 1);
    assert_eq!(json["no_data"].as_u64().unwrap(), 1);
    assert_eq!(json["misaligned"].as_u64().unwrap(), 1);
    assert_eq!(json["frames_with_erased_bits"].as_u64().unwrap(), 1);
    assert_eq!(json["encoding"].as_str().unwrap(), "g192");
}

/// Run eid-ev on `input` with two sync-only patterns for layers {2, 4}.
fn exit_code_for(input: &[u16], extra: &[&str]) -> i32 {
    let exe = env!("CARGO_BIN_EXE_eid-ev");
    let dir = tempfile::tempdir().unwrap();
    let bs = dir.path().join("in.g192");
    let ep0 = dir.path().join("ep0.g192");
    let ep1 = dir.path().join("ep1.g192");
    let out = dir.path().join("out.g192");
    fs::write(&bs, g192(input)).unwrap();
    fs::write(&ep0, g192(&[SYNC])).unwrap();
    fs::write(&ep1, g192(&[SYNC])).unwrap();

    let status = Command::new(exe)
        .arg("-q")
        .args(extra)
        .args([path_str(&bs), path_str(&ep0), path_str(&ep1), path_str(&out)])
        .status()
        .expect("run failed");
    status.code().unwrap()
}

#[test]
fn illegal_frame_length_exits_with_5() {
    assert_eq!(exit_code_for(&[SYNC, 3, ONE, ONE, ONE], &["--layers", "2,4"]), 5);
}

#[test]
fn pattern_count_mismatch_exits_with_5() {
    assert_eq!(exit_code_for(&[SYNC, 2, ONE, ONE], &["--layers", "2,4,6"]), 5);
}

#[test]
fn byte_output_of_wide_layers_exits_with_5() {
    assert_eq!(
        exit_code_for(&[SYNC, 2, ONE, ONE], &["--layers", "2,400", "--obs", "byte"]),
        5
    );
}

#[test]
fn truncated_headered_frame_exits_with_9() {
    assert_eq!(exit_code_for(&[SYNC, 4, ONE, ONE], &["--layers", "2,4"]), 9);
}

#[test]
fn missing_input_exits_with_7() {
    let exe = env!("CARGO_BIN_EXE_eid-ev");
    let dir = tempfile::tempdir().unwrap();
    let ep0 = dir.path().join("ep0.g192");
    let ep1 = dir.path().join("ep1.g192");
    fs::write(&ep0, g192(&[SYNC])).unwrap();
    fs::write(&ep1, g192(&[SYNC])).unwrap();
    let output = Command::new(exe)
        .args([
            "--layers",
            "2,4",
            path_str(&dir.path().join("missing.g192")),
            path_str(&ep0),
            path_str(&ep1),
            path_str(&dir.path().join("out.g192")),
        ])
        .output()
        .expect("run failed");
    assert_eq!(output.status.code(), Some(7));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.g192"));
}
