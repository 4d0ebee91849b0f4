//! Integration tests for the `afc-cli` binary: writes a request/config JSON
//! pair to a temp directory, runs the compiled binary, and checks the
//! artifacts it produces (mirrors `uls-api/tests/api_tests.rs`'s
//! build-inputs-then-drive-the-binary style, adapted for a CLI rather than
//! an HTTP server).

use std::fs;
use std::io::Read;
use std::process::Command;

use flate2::read::GzDecoder;
use tempfile::TempDir;

fn afc_cli_bin() -> &'static str {
    env!("CARGO_BIN_EXE_afc-cli")
}

fn read_gz_json(path: &std::path::Path) -> serde_json::Value {
    let file = fs::File::open(path).unwrap();
    let mut decoder = GzDecoder::new(file);
    let mut contents = String::new();
    decoder.read_to_string(&mut contents).unwrap();
    serde_json::from_str(&contents).unwrap()
}

#[test]
fn point_analysis_run_produces_response_and_artifacts() {
    let dir = TempDir::new().unwrap();

    let request = serde_json::json!({
        "requestId": "cli-test-1",
        "deviceDescriptor": {"serialNumber": "SN1"},
        "location": {
            "ellipse": {"center": {"latitude": 40.0, "longitude": -74.0}, "majorAxis": 100.0, "minorAxis": 100.0, "orientation": 0.0},
            "height": 5.0,
            "heightType": "AGL",
            "verticalUncertainty": 2.0,
            "indoorDeployment": 0
        },
        "inquiredFrequencyRange": [{"lowFrequency": 5945.0, "highFrequency": 5985.0}]
    });
    let request_path = dir.path().join("request.json");
    fs::write(&request_path, serde_json::to_vec_pretty(&request).unwrap()).unwrap();

    let config = afc_config::AfcConfig::default();
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, config.to_json_pretty().unwrap()).unwrap();

    let output_path = dir.path().join("response.json.gz");
    let temp_dir = dir.path().join("tmp");

    let status = Command::new(afc_cli_bin())
        .args([
            "--request-type",
            "PointAnalysis",
            "--state-root",
            dir.path().to_str().unwrap(),
            "--input-file-path",
            request_path.to_str().unwrap(),
            "--config-file-path",
            config_path.to_str().unwrap(),
            "--output-file-path",
            output_path.to_str().unwrap(),
            "--temp-dir",
            temp_dir.to_str().unwrap(),
            "--log-level",
            "error",
        ])
        .status()
        .unwrap();
    assert!(status.success());

    let envelope = read_gz_json(&output_path);
    let responses = envelope["availableSpectrumInquiryResponses"].as_array().unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["requestId"], "cli-test-1");
    assert_eq!(responses[0]["response"]["responseCode"], 0);
    assert!(!responses[0]["availableSpectrumInfo"].as_array().unwrap().is_empty());

    assert!(temp_dir.join("progress.txt").exists());
    assert!(temp_dir.join("fs_anom.csv.gz").exists());
    assert!(temp_dir.join("userInputs.csv.gz").exists());
}

#[test]
fn missing_input_file_exits_nonzero_with_a_message() {
    let dir = TempDir::new().unwrap();
    let config = afc_config::AfcConfig::default();
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, config.to_json_pretty().unwrap()).unwrap();

    let output = Command::new(afc_cli_bin())
        .args([
            "--request-type",
            "PointAnalysis",
            "--state-root",
            dir.path().to_str().unwrap(),
            "--input-file-path",
            dir.path().join("does-not-exist.json").to_str().unwrap(),
            "--config-file-path",
            config_path.to_str().unwrap(),
            "--output-file-path",
            dir.path().join("out.json.gz").to_str().unwrap(),
            "--temp-dir",
            dir.path().join("tmp").to_str().unwrap(),
        ])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("afc-cli:"));
}
