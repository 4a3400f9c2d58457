// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runs the `ldv-driver` binary end to end.

use std::io::Write;
use std::process::{Command, Output};

fn ldv_driver(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ldv-driver"))
        .args(args)
        .env_remove("LDV_LOG")
        .output()
        .expect("failed to run ldv-driver")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn check_registry_matches() {
    let output = ldv_driver(&["--output-format", "json", "--jobs", "2"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stdout));
    let report = stdout_json(&output);
    assert_eq!(report["totals"]["mismatched"], 0);
    assert!(report["totals"]["matched"].as_u64().unwrap() > 30);
}

#[test]
fn check_harness_filter() {
    let output = ldv_driver(&[
        "--output-format",
        "json",
        "--exact",
        "--harness",
        "mutex::check_double_lock",
    ]);
    assert!(output.status.success());
    let report = stdout_json(&output);
    let successes = report["successes"].as_array().unwrap();
    assert_eq!(successes.len(), 1);
    assert_eq!(successes[0]["harness"]["name"], "mutex::check_double_lock");
    let cex = &successes[0]["exploration"]["counterexamples"][0];
    assert_eq!(cex["violation"]["kind"], "double-acquire");

    let output = ldv_driver(&["--exact", "--harness", "check_double_lock"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("error:"));
}

#[test]
fn check_configuration_changes_outcome() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[environment.err-ptr]\nerr-or-null = \"always-false\"").unwrap();
    let path = config.path().to_str().unwrap();

    // The guard no longer filters out null pointers.
    let output = ldv_driver(&["--config", path, "--harness", "err_ptr::check_err_or_null"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Verification failed for - err_ptr::check_err_or_null"));
    // The harness that pins its own configuration is unaffected.
    assert!(!stdout.contains("Verification failed for - err_ptr::check_err_or_null_blind"));
}

#[test]
fn check_list() {
    let output = ldv_driver(&["list", "--format", "json", "--model", "rwlock"]);
    assert!(output.status.success());
    let list = stdout_json(&output);
    let harnesses = list["harnesses"].as_array().unwrap();
    assert!(!harnesses.is_empty());
    assert!(harnesses.iter().all(|harness| harness["family"] == "rwlock"));

    let output = ldv_driver(&["list"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("sdio::check_claimed_io"));
}
