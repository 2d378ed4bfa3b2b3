use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dp-cli"))
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("dp_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

/// Flat background plus a peak at 125 GeV, as a mass-summary JSON file.
fn write_mass_summary() -> PathBuf {
    let mut masses = Vec::new();
    for i in 100..160 {
        for k in 0..10 {
            masses.push(i as f64 + 0.05 + 0.1 * k as f64);
        }
    }
    for _ in 0..200 {
        masses.push(125.0);
    }
    for _ in 0..100 {
        masses.push(123.9);
        masses.push(126.1);
    }
    let path = tmp_path("masses.json");
    let json = serde_json::json!({ "mass_values": masses });
    std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();
    path
}

fn assert_spectrum_contract(v: &serde_json::Value) {
    let centres = v
        .get("bin_centres")
        .and_then(|x| x.as_array())
        .expect("bin_centres should be an array");
    assert_eq!(centres.len(), 30, "default binning has 30 bins");

    for field in ["data_x", "data_x_errors", "background", "signal_x", "best_fit"] {
        let arr = v
            .get(field)
            .and_then(|x| x.as_array())
            .unwrap_or_else(|| panic!("{field} should be an array"));
        assert_eq!(arr.len(), centres.len(), "{field} length must match bin_centres");
        for x in arr {
            assert!(x.as_f64().is_some(), "{field} entries must be numbers");
        }
    }
}

#[test]
fn fit_writes_valid_spectrum_to_stdout() {
    let input = write_mass_summary();

    let out = run(&["fit", "--input", input.to_string_lossy().as_ref()]);
    assert!(
        out.status.success(),
        "fit should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON");
    assert_spectrum_contract(&v);
}

#[test]
fn fit_writes_valid_spectrum_to_file() {
    let input = write_mass_summary();
    let output = tmp_path("spectrum.json");

    let out = run(&[
        "fit",
        "--input",
        input.to_string_lossy().as_ref(),
        "--output",
        output.to_string_lossy().as_ref(),
    ]);
    assert!(
        out.status.success(),
        "fit should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let bytes = std::fs::read(&output).expect("output file should exist");
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_spectrum_contract(&v);
}

#[test]
fn fit_rejects_malformed_summary() {
    let path = tmp_path("bad.json");
    std::fs::write(&path, b"{\"foo\": 1}").unwrap();

    let out = run(&["fit", "--input", path.to_string_lossy().as_ref()]);
    assert!(!out.status.success(), "malformed input should fail");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("validation"), "unexpected stderr: {stderr}");
}

#[test]
fn process_skips_missing_datasets_and_fails_cleanly_when_all_empty() {
    let data_dir = tmp_path("no_data");
    std::fs::create_dir_all(&data_dir).unwrap();

    // Every dataset is unreadable, so the surviving set is empty and the
    // mass summary fails its own validation: non-zero exit, no crash.
    let out = run(&[
        "process",
        "--data-dir",
        data_dir.to_string_lossy().as_ref(),
        "--datasets",
        "missing_a,missing_b",
    ]);
    assert!(!out.status.success());
}
