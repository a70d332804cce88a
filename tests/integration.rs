mod common;

use common::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn bkh_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("bkh");
    path
}

fn run_bkh(config_path: Option<&Path>, args: &[&str]) -> (String, String, bool) {
    let binary = bkh_binary();
    let mut command = Command::new(&binary);
    if let Some(config) = config_path {
        command.arg("--config").arg(config);
    }
    let output = command
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run bkh binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn manifest_arg(backup: &Backup) -> String {
    backup.manifest.to_string_lossy().to_string()
}

#[tokio::test]
async fn test_scan_prints_summary_and_writes_urls() {
    let backup = three_row_backup().await;
    let config = backup.write_config();

    let (stdout, stderr, success) = run_bkh(Some(&config), &[&manifest_arg(&backup)]);
    assert!(success, "bkh failed: {}", stderr);
    assert!(stdout.contains("rows loaded: 3"), "stdout: {}", stdout);
    assert!(stdout.contains("records: 3"));
    assert!(stdout.contains("files correlated: 1"));
    assert!(stderr.contains("elapsed: 00:"), "stderr: {}", stderr);

    let lines = url_lines(&backup.urls_path());
    assert!(lines.iter().any(|l| l == EXAMPLE_URL));
    assert!(lines.iter().all(|l| !l.contains("content.icloud.com")));
}

#[tokio::test]
async fn test_urls_out_overrides_config() {
    let backup = three_row_backup().await;
    let config = backup.write_config();
    let custom = backup.out_dir().join("harvest").join("links.txt");

    let (_, stderr, success) = run_bkh(
        Some(&config),
        &[&manifest_arg(&backup), "--urls-out", custom.to_str().unwrap()],
    );
    assert!(success, "bkh failed: {}", stderr);
    assert!(url_lines(&custom).iter().any(|l| l == EXAMPLE_URL));
    assert!(!backup.urls_path().exists());
}

#[tokio::test]
async fn test_domain_query_report() {
    let backup = three_row_backup().await;
    let config = backup.write_config();

    let (stdout, stderr, success) = run_bkh(
        Some(&config),
        &[&manifest_arg(&backup), "--domain", "CameraRollDomain"],
    );
    assert!(success, "bkh failed: {}", stderr);
    assert!(stdout.contains("query: domain = CameraRollDomain"));
    assert!(stdout.contains("matches: 1"));
    assert!(stdout.contains(CAMERA_ID));
    assert!(stdout.contains("image/jpeg"));
    assert!(!stdout.contains(MISSING_ID));
}

#[tokio::test]
async fn test_json_output() {
    let backup = three_row_backup().await;
    let config = backup.write_config();

    let (stdout, stderr, success) = run_bkh(
        Some(&config),
        &[&manifest_arg(&backup), "--content-type", "image", "--json"],
    );
    assert!(success, "bkh failed: {}", stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("invalid JSON ({}): {}", e, stdout));
    assert_eq!(json["summary"]["records"], 3);
    assert_eq!(json["summary"]["correlation"]["resolved"], 1);
    assert_eq!(json["queries"][0]["matches"], 1);
    assert_eq!(json["queries"][0]["histogram"]["image/jpeg"], 1);
}

#[tokio::test]
async fn test_export_copies_queried_blobs() {
    let backup = three_row_backup().await;
    let config = backup.write_config();
    let export_dir = backup.out_dir().join("exports");

    let (stdout, stderr, success) = run_bkh(
        Some(&config),
        &[
            &manifest_arg(&backup),
            "--path-hint",
            "DCIM",
            "--export",
            "--export-dir",
            export_dir.to_str().unwrap(),
        ],
    );
    assert!(success, "bkh failed: {}", stderr);
    assert!(stdout.contains("exported: 1 files"), "stdout: {}", stdout);

    let folders: Vec<PathBuf> = fs::read_dir(&export_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(folders.len(), 1);
    assert!(folders[0].to_string_lossy().ends_with("_output"));
    assert_eq!(fs::read(folders[0].join("IMG_0001.JPG")).unwrap(), JPEG_BYTES);
}

#[tokio::test]
async fn test_export_without_query_is_rejected() {
    let backup = three_row_backup().await;
    let (_, stderr, success) = run_bkh(None, &[&manifest_arg(&backup), "--export"]);
    assert!(!success);
    assert!(stderr.contains("--export"), "stderr: {}", stderr);
}

#[test]
fn test_non_database_manifest_fails() {
    let backup = Backup::new();
    fs::write(&backup.manifest, "just some text").unwrap();
    let config = backup.write_config();

    let (_, stderr, success) = run_bkh(Some(&config), &[&manifest_arg(&backup)]);
    assert!(!success);
    assert!(stderr.contains("not a SQLite 3 database"), "stderr: {}", stderr);
}

#[test]
fn test_missing_manifest_fails() {
    let backup = Backup::new();
    let config = backup.write_config();

    let (_, _, success) = run_bkh(Some(&config), &[&manifest_arg(&backup)]);
    assert!(!success);
}

#[tokio::test]
async fn test_missing_config_file_fails() {
    let backup = three_row_backup().await;
    let missing = backup.tmp.path().join("nope.toml");

    let (_, stderr, success) = run_bkh(Some(&missing), &[&manifest_arg(&backup)]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[tokio::test]
async fn test_invalid_config_fails() {
    let backup = three_row_backup().await;
    let config = backup.tmp.path().join("bad.toml");
    fs::write(&config, "[extract]\nmax_depth = 0\n").unwrap();

    let (_, stderr, success) = run_bkh(Some(&config), &[&manifest_arg(&backup)]);
    assert!(!success);
    assert!(stderr.contains("max_depth"), "stderr: {}", stderr);
}
