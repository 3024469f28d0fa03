//! End-to-end CLI tests for the regfetch binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AGENCY: &str = "environmental-protection-agency";

/// Runs the binary against `server` on a blocking thread so the mock keeps serving.
async fn run_against(server: &MockServer, extra: &[&str]) -> std::process::Output {
    let uri = server.uri();
    let mut args: Vec<String> = vec![
        "--site-base".into(),
        uri.clone(),
        "--api-base".into(),
        format!("{uri}/api/v1"),
        "--rate-limit-ms".into(),
        "0".into(),
        "--retry-base-delay-ms".into(),
        "1".into(),
        "--retry-max-delay-ms".into(),
        "5".into(),
        "--no-monitor".into(),
    ];
    args.extend(extra.iter().map(ToString::to_string));
    tokio::task::spawn_blocking(move || {
        Command::cargo_bin("regfetch")
            .unwrap()
            .args(&args)
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    })
    .await
    .unwrap()
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("regfetch").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Federal Register"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("regfetch").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("regfetch"));
}

/// Test that a missing agency causes non-zero exit.
#[test]
fn test_binary_requires_agency() {
    let mut cmd = Command::cargo_bin("regfetch").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("regfetch").unwrap();
    cmd.args(["--invalid-flag", AGENCY])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that an unusable endpoint is reported as a configuration error.
#[test]
fn test_binary_rejects_invalid_endpoint() {
    let mut cmd = Command::cargo_bin("regfetch").unwrap();
    cmd.args(["--api-base", "not a url", AGENCY])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[tokio::test]
async fn test_binary_prints_one_json_line_per_document() {
    let server = MockServer::start().await;
    let records: Vec<Value> = ["2021-08964", "2021-08965"]
        .iter()
        .map(|id| {
            json!({
                "document_number": id,
                "title": format!("Air Plan Approval {id}"),
                "publication_date": "2021-04-29",
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/v1/documents.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "total_pages": 1,
            "results": records,
        })))
        .mount(&server)
        .await;
    for id in ["2021-08964", "2021-08965"] {
        Mock::given(method("GET"))
            .and(path(format!("/documents/full_text/xml/2021/04/29/{id}.xml")))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<RULE><P>The Agency approves revisions to the state implementation plan for ozone.</P></RULE>",
            ))
            .mount(&server)
            .await;
    }

    let output = run_against(&server, &["-q", AGENCY]).await;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["identifier"], "2021-08964");
    assert_eq!(lines[0]["source"], "structured");
    assert_eq!(lines[1]["agency"], AGENCY);
    assert!(lines[1]["words"].as_u64().unwrap() > 5);
}

#[tokio::test]
async fn test_binary_fails_when_nothing_retrieved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/documents.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 0, "results": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/documents/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    let output = run_against(&server, &["-q", AGENCY]).await;
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
