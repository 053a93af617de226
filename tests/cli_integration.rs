#![cfg(feature = "cli")]

use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_vcdecode").to_string()
}

const SOURCE: &[u8] = b"abcde12345abcde12345abcde12345abcde12345";
const TARGET: &[u8] = b"abcdeXXXXXabcde12345abcde12345abcde12345!";

fn write_fixture(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let source = dir.join("source.bin");
    let delta = dir.join("delta.vcdiff");
    std::fs::write(&source, SOURCE).unwrap();
    std::fs::write(&delta, xdelta3::encode(TARGET, SOURCE).unwrap()).unwrap();
    (source, delta)
}

#[test]
fn cli_decode_to_file() {
    let dir = tempdir().unwrap();
    let (source, delta) = write_fixture(dir.path());
    let output = dir.path().join("output.bin");

    let st = Command::new(bin())
        .args(["decode", "--source"])
        .arg(&source)
        .arg(&delta)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), TARGET);
}

#[test]
fn cli_refuses_to_overwrite_without_force() {
    let dir = tempdir().unwrap();
    let (source, delta) = write_fixture(dir.path());
    let output = dir.path().join("output.bin");
    std::fs::write(&output, b"keep me").unwrap();

    let st = Command::new(bin())
        .args(["decode", "-s"])
        .arg(&source)
        .arg(&delta)
        .arg(&output)
        .status()
        .unwrap();
    assert!(!st.success());
    assert_eq!(std::fs::read(&output).unwrap(), b"keep me");

    let st = Command::new(bin())
        .args(["--force", "decode", "-s"])
        .arg(&source)
        .arg(&delta)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), TARGET);
}

#[test]
fn cli_decode_stdin_to_stdout() {
    let dir = tempdir().unwrap();
    let (source, delta) = write_fixture(dir.path());

    let mut child = Command::new(bin())
        .args(["decode", "-c", "-s"])
        .arg(&source)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(&std::fs::read(&delta).unwrap())
        .unwrap();
    let out = child.wait_with_output().unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout, TARGET);
}

#[test]
fn cli_check_only_with_json_stats() {
    let dir = tempdir().unwrap();
    let (source, delta) = write_fixture(dir.path());

    let out = Command::new(bin())
        .args(["--json", "decode", "--check-only", "-s"])
        .arg(&source)
        .arg("--input")
        .arg(&delta)
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(out.stdout.is_empty());
    let stats: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(stats["output_size"], TARGET.len());
    assert_eq!(stats["command"], "decode");
}

#[test]
fn cli_truncated_delta_fails_cleanly() {
    let dir = tempdir().unwrap();
    let (source, delta) = write_fixture(dir.path());
    let mut bytes = std::fs::read(&delta).unwrap();
    bytes.truncate(bytes.len() - 2);
    std::fs::write(&delta, bytes).unwrap();

    let out = Command::new(bin())
        .args(["decode", "--check-only", "-s"])
        .arg(&source)
        .arg(&delta)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(!out.stderr.is_empty());
}

#[test]
fn cli_headers_and_delta_listing() {
    let dir = tempdir().unwrap();
    let (_, delta) = write_fixture(dir.path());

    let out = Command::new(bin()).arg("headers").arg(&delta).output().unwrap();
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("VCDIFF window number:         0"));
    assert!(text.contains(&format!(
        "VCDIFF target window length:  {}",
        TARGET.len()
    )));

    let out = Command::new(bin()).arg("delta").arg(&delta).output().unwrap();
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("Offset Instruction"));
}

#[test]
fn cli_header_json() {
    let dir = tempdir().unwrap();
    let (_, delta) = write_fixture(dir.path());

    let out = Command::new(bin())
        .args(["--json", "header"])
        .arg(&delta)
        .output()
        .unwrap();
    assert!(out.status.success());
    let info: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(info["windows"].as_array().map(Vec::len), Some(1));
}

#[test]
fn cli_rejects_non_vcdiff() {
    let dir = tempdir().unwrap();
    let junk = dir.path().join("junk.bin");
    std::fs::write(&junk, b"definitely not a delta").unwrap();

    let st = Command::new(bin()).arg("header").arg(&junk).status().unwrap();
    assert!(!st.success());
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("HARD_MAX_WINSIZE="));
}

#[test]
fn cli_delta_json_lists_instructions() {
    let dir = tempdir().unwrap();
    let (_, delta) = write_fixture(dir.path());

    let out = Command::new(bin())
        .args(["--json", "delta"])
        .arg(&delta)
        .output()
        .unwrap();
    assert!(out.status.success());
    let info: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let insts = info["windows"][0]["instructions"].as_array().unwrap();
    assert!(!insts.is_empty());
    assert_eq!(insts[0]["offset"], 0);
    assert!(insts.iter().all(|i| i["instruction"].is_string()));
}
