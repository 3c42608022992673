//! CLI integration tests for imprint-cli.
//!
//! These tests verify the CLI behavior by running the actual binary
//! and checking outputs, exit codes, and file artifacts.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use assert_cmd::Command;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

/// Get a Command for the imprint binary with a clean environment.
fn imprint(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("imprint").unwrap();
    cmd.current_dir(workdir)
        .env_remove("DATABASE_URL")
        .env_remove("DATASET_DIR")
        .env_remove("ALERTS_DIR")
        .env_remove("CLASSIFIER_URL")
        .env_remove("SIMILARITY_THRESHOLD")
        .env_remove("MAX_SIMILAR_RESULTS")
        .env_remove("DATASET_CACHE")
        .env_remove("REPORT_POLICY")
        .env_remove("REPORT_MIN_CONFIDENCE")
        .env_remove("RUST_LOG");
    cmd
}

fn create_test_png(seed: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(80, 80, |x, y| {
        let checker = if (x / 10 + y / 10) % 2 == 0 { 60 } else { 0 };
        Rgb([
            (x as u8).wrapping_mul(3).wrapping_add(seed),
            (y as u8).wrapping_mul(3),
            checker,
        ])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

fn database_url(dir: &Path) -> String {
    format!("sqlite:{}", dir.join("imprint.db").display())
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    let tmp = TempDir::new().unwrap();
    imprint(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Image fingerprinting"))
        .stdout(predicate::str::contains("fingerprint"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("bootstrap"));
}

#[test]
fn test_version_displays_version() {
    let tmp = TempDir::new().unwrap();
    imprint(tmp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("imprint"));
}

#[test]
fn test_help_shows_exit_codes() {
    let tmp = TempDir::new().unwrap();
    imprint(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("66"));
}

#[test]
fn test_analyze_help_shows_options() {
    let tmp = TempDir::new().unwrap();
    imprint(tmp.path())
        .args(["analyze", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--mock"))
        .stdout(predicate::str::contains("--classifier-url"))
        .stdout(predicate::str::contains("--report-policy"))
        .stdout(predicate::str::contains("--max-similar"))
        .stdout(predicate::str::contains("--dataset-cache"))
        .stdout(predicate::str::contains("--json"));
}

// ============================================================================
// Fingerprint Tests
// ============================================================================

#[test]
fn test_fingerprint_prints_digest_and_phash() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.png"), create_test_png(0)).unwrap();

    let output = imprint(tmp.path())
        .args(["fingerprint", "a.png"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let fields: Vec<&str> = stdout.split_whitespace().collect();
    assert_eq!(fields.len(), 3, "unexpected output: {stdout}");
    assert_eq!(fields[0].len(), 64);
    assert!(fields[0].chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(fields[1].len(), 16);
    assert_eq!(fields[2], "a.png");
}

#[test]
fn test_fingerprint_ignores_encoder_settings() {
    let tmp = TempDir::new().unwrap();
    let png = create_test_png(9);
    fs::write(tmp.path().join("a.png"), &png).unwrap();

    // Same pixels, different encoder settings.
    let decoded = image::load_from_memory(&png).unwrap();
    let mut fast = Cursor::new(Vec::new());
    let encoder =
        PngEncoder::new_with_quality(&mut fast, CompressionType::Fast, FilterType::NoFilter);
    decoded.write_with_encoder(encoder).unwrap();
    assert_ne!(fast.get_ref(), &png);
    fs::write(tmp.path().join("b.png"), fast.into_inner()).unwrap();

    let output = imprint(tmp.path())
        .args(["fingerprint", "--json", "a.png", "b.png"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let lines: Vec<Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["fingerprint"], lines[1]["fingerprint"]);
    assert_eq!(lines[0]["perceptual_hash"], lines[1]["perceptual_hash"]);
}

#[test]
fn test_fingerprint_missing_file_exits_66() {
    let tmp = TempDir::new().unwrap();
    imprint(tmp.path())
        .args(["fingerprint", "nope.png"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("nope.png"));
}

#[test]
fn test_fingerprint_non_image_exits_65() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("notes.txt"), "definitely not pixels").unwrap();

    imprint(tmp.path())
        .args(["fingerprint", "notes.txt"])
        .assert()
        .code(65);
}

// ============================================================================
// Search Tests
// ============================================================================

#[test]
fn test_search_finds_exact_copy() {
    let tmp = TempDir::new().unwrap();
    let dataset = tmp.path().join("dataset");
    fs::create_dir_all(dataset.join("nested")).unwrap();
    fs::write(dataset.join("original.png"), create_test_png(1)).unwrap();
    fs::write(dataset.join("other.png"), create_test_png(120)).unwrap();
    fs::write(dataset.join("nested/copy.png"), create_test_png(1)).unwrap();
    fs::write(tmp.path().join("query.png"), create_test_png(1)).unwrap();

    imprint(tmp.path())
        .args(["search", "query.png", "--dataset", "dataset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("original.png"))
        .stdout(predicate::str::contains("copy.png").not())
        .stdout(predicate::str::contains("other.png").not());

    imprint(tmp.path())
        .args(["search", "query.png", "--dataset", "dataset", "--recursive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nested/copy.png"))
        .stdout(predicate::str::contains("original.png"));
}

#[test]
fn test_search_json_lists_matches() {
    let tmp = TempDir::new().unwrap();
    let dataset = tmp.path().join("dataset");
    fs::create_dir(&dataset).unwrap();
    fs::write(dataset.join("original.png"), create_test_png(1)).unwrap();
    fs::write(tmp.path().join("query.png"), create_test_png(1)).unwrap();
    fs::write(tmp.path().join("unseen.png"), create_test_png(200)).unwrap();

    let output = imprint(tmp.path())
        .args(["search", "query.png", "--dataset", "dataset", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["query"], "query.png");
    assert_eq!(
        result["matches"],
        serde_json::json!([{"identifier": "original.png", "distance": 0}])
    );

    let output = imprint(tmp.path())
        .args(["search", "unseen.png", "--dataset", "dataset", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["matches"], serde_json::json!([]));
}

#[test]
fn test_search_missing_dataset_exits_66() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("query.png"), create_test_png(1)).unwrap();

    imprint(tmp.path())
        .args(["search", "query.png", "--dataset", "no-such-dir"])
        .assert()
        .code(66);
}

// ============================================================================
// Store Tests
// ============================================================================

#[test]
fn test_analyze_then_store_admin() {
    let tmp = TempDir::new().unwrap();
    let db = database_url(tmp.path());
    fs::create_dir(tmp.path().join("dataset")).unwrap();
    fs::write(tmp.path().join("beach.png"), create_test_png(2)).unwrap();

    imprint(tmp.path())
        .args(["analyze", "beach.png", "--mock", "real", "--database", &db])
        .assert()
        .success();

    imprint(tmp.path())
        .args(["store", "--database", &db, "count"])
        .assert()
        .success()
        .stdout("1\n");

    imprint(tmp.path())
        .args(["store", "--database", &db, "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("beach.png"));

    imprint(tmp.path())
        .args(["store", "--database", &db, "get", "beach.png"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Perceptual hash:"));

    imprint(tmp.path())
        .args(["store", "--database", &db, "delete", "beach.png"])
        .assert()
        .success();

    imprint(tmp.path())
        .args(["store", "--database", &db, "get", "beach.png"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("No fingerprint for key 'beach.png'"));
}

#[test]
fn test_similar_finds_stored_fingerprint() {
    let tmp = TempDir::new().unwrap();
    let db = database_url(tmp.path());
    fs::create_dir(tmp.path().join("dataset")).unwrap();
    fs::write(tmp.path().join("first.png"), create_test_png(3)).unwrap();

    imprint(tmp.path())
        .args([
            "analyze",
            "first.png",
            "--identifier",
            "stored-first",
            "--mock",
            "real",
            "--database",
            &db,
        ])
        .assert()
        .success();

    imprint(tmp.path())
        .args(["similar", "first.png", "--database", &db])
        .assert()
        .success()
        .stdout(predicate::str::contains(" 0  stored-first"));

    let output = imprint(tmp.path())
        .args(["similar", "first.png", "--database", &db, "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["query"], "first.png");
    assert_eq!(result["matches"][0]["identifier"], "stored-first");
    assert_eq!(result["matches"][0]["distance"], 0);
}

// ============================================================================
// Analyze Tests
// ============================================================================

#[test]
fn test_analyze_mock_fake_json_writes_artifacts() {
    let tmp = TempDir::new().unwrap();
    let db = database_url(tmp.path());
    let dataset = tmp.path().join("dataset");
    fs::create_dir(&dataset).unwrap();
    fs::write(dataset.join("known.png"), create_test_png(4)).unwrap();
    fs::write(tmp.path().join("upload.png"), create_test_png(4)).unwrap();

    let output = imprint(tmp.path())
        .args([
            "analyze",
            "upload.png",
            "--mock",
            "fake",
            "--database",
            &db,
            "--alerts",
            "alerts",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["identifier"], "upload.png");
    assert_eq!(result["verdict"]["label"], "FAKE");
    assert_eq!(result["exact_matches"], serde_json::json!(["known.png"]));
    assert_eq!(result["stage_errors"], serde_json::json!([]));
    assert!(result["artifacts"]["alert_ref"].is_string());

    let written = fs::read_dir(tmp.path().join("alerts")).unwrap().count();
    assert_eq!(written, 2);
}

#[test]
fn test_analyze_real_verdict_writes_no_artifacts() {
    let tmp = TempDir::new().unwrap();
    let db = database_url(tmp.path());
    fs::create_dir(tmp.path().join("dataset")).unwrap();
    fs::write(tmp.path().join("upload.png"), create_test_png(5)).unwrap();

    imprint(tmp.path())
        .args([
            "analyze", "upload.png", "--mock", "real", "--database", &db, "--alerts", "alerts",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("REAL"));

    assert!(!tmp.path().join("alerts").exists());
}

#[test]
fn test_analyze_missing_dataset_is_a_warning() {
    let tmp = TempDir::new().unwrap();
    let db = database_url(tmp.path());
    fs::write(tmp.path().join("upload.png"), create_test_png(6)).unwrap();

    imprint(tmp.path())
        .args([
            "analyze",
            "upload.png",
            "--mock",
            "real",
            "--database",
            &db,
            "--dataset",
            "missing",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Warning:"))
        .stdout(predicate::str::contains("search"));
}

#[test]
fn test_analyze_without_classifier_exits_64() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("upload.png"), create_test_png(7)).unwrap();

    imprint(tmp.path())
        .args(["analyze", "upload.png"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("No classifier configured"));
}

#[test]
fn test_analyze_invalid_policy_exits_64() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("upload.png"), create_test_png(7)).unwrap();

    imprint(tmp.path())
        .args(["analyze", "upload.png", "--mock", "real", "--report-policy", "sometimes"])
        .assert()
        .code(64);
}

#[test]
fn test_analyze_undecodable_exits_65() {
    let tmp = TempDir::new().unwrap();
    let db = database_url(tmp.path());
    fs::write(tmp.path().join("broken.png"), b"\x89PNG\r\n\x1a\ngarbage").unwrap();

    imprint(tmp.path())
        .args(["analyze", "broken.png", "--mock", "real", "--database", &db])
        .assert()
        .code(65);

    // Decode failures abort before anything is persisted.
    imprint(tmp.path())
        .args(["store", "--database", &db, "count"])
        .assert()
        .success()
        .stdout("0\n");
}

// ============================================================================
// Bootstrap Tests
// ============================================================================

/// Serve `/ok.png` (a valid image) and `/tiny.png` (too small) on a local port.
fn spawn_image_server(png: Vec<u8>) -> String {
    use axum::{routing::get, Router};

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let app = Router::new()
                .route("/ok.png", get(move || async move { png }))
                .route("/tiny.png", get(|| async { vec![0u8; 16] }));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    format!("http://{}", rx.recv().unwrap())
}

#[test]
fn test_bootstrap_downloads_manifest_entries() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_image_server(create_test_png(8));
    fs::write(
        tmp.path().join("manifest.txt"),
        format!(
            "# reference images\nfaces/one.png {base}/ok.png\n\nlogos/two.png {base}/ok.png\n"
        ),
    )
    .unwrap();

    imprint(tmp.path())
        .args(["bootstrap", "--manifest", "manifest.txt", "--dataset", "dataset"])
        .assert()
        .success();

    for path in ["dataset/faces/one.png", "dataset/logos/two.png"] {
        let bytes = fs::read(tmp.path().join(path)).unwrap();
        assert!(image::load_from_memory(&bytes).is_ok(), "{path} is not an image");
    }
}

#[test]
fn test_bootstrap_reports_failed_items() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_image_server(create_test_png(8));
    fs::write(
        tmp.path().join("manifest.txt"),
        format!(
            "good.png {base}/ok.png\ntiny.png {base}/tiny.png\nmissing.png {base}/missing.png\n"
        ),
    )
    .unwrap();

    imprint(tmp.path())
        .args([
            "bootstrap",
            "--manifest",
            "manifest.txt",
            "--dataset",
            "dataset",
            "--max-attempts",
            "1",
        ])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("2 of 3 downloads failed"));

    assert!(tmp.path().join("dataset/good.png").exists());
    assert!(!tmp.path().join("dataset/tiny.png").exists());
    assert!(!tmp.path().join("dataset/missing.png").exists());
}

#[test]
fn test_bootstrap_rejects_bad_manifest() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("manifest.txt"),
        "ok.png https://example.org/ok.png\n../escape.png https://example.org/x.png\n",
    )
    .unwrap();

    imprint(tmp.path())
        .args(["bootstrap", "--manifest", "manifest.txt"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("line 2"));
}
