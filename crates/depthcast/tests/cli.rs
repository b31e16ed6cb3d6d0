use assert_cmd::Command;
use depthcast::core::GrayImage;
use depthcast::pipeline::artifacts::{load_gray_png, save_gray_png};
use depthcast::Settings;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn depthcast() -> Command {
    Command::cargo_bin("depthcast").expect("binary built")
}

fn fill_rect(img: &mut GrayImage, xs: std::ops::Range<usize>, ys: std::ops::Range<usize>, v: u8) {
    for y in ys {
        for x in xs.clone() {
            img.set(x, y, v);
        }
    }
}

fn write_png(dir: &Path, name: &str, img: &GrayImage) -> PathBuf {
    let path = dir.join(name);
    save_gray_png(img, &path).expect("save png");
    path
}

fn two_object_depth() -> GrayImage {
    let mut img = GrayImage::new(160, 120);
    fill_rect(&mut img, 10..50, 10..50, 120);
    fill_rect(&mut img, 80..140, 60..110, 200);
    img
}

#[test]
fn init_config_writes_default_settings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");

    depthcast()
        .args(["init-config", "--out"])
        .arg(&path)
        .assert()
        .success();
    let loaded = Settings::load_json(&path).expect("valid settings");
    assert_eq!(loaded.segmentation, Settings::default().segmentation);

    depthcast()
        .args(["init-config", "--out"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn segment_writes_masks_and_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_png(dir.path(), "depth.png", &two_object_depth());
    let out = dir.path().join("out");

    depthcast()
        .args(["segment", "--min-area", "100", "--input"])
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 regions"));

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.join("segments.json")).expect("report"),
    )
    .expect("json");
    assert_eq!(report["regions"]["regions"][0]["area"], 1600);
    assert_eq!(report["regions"]["regions"][1]["area"], 3000);

    let mask = load_gray_png(out.join("mask_1.png")).expect("mask");
    assert_eq!(mask.get(100, 80), 255);
    assert_eq!(mask.get(20, 20), 0);
}

#[test]
fn segment_overrides_cap_the_region_count() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_png(dir.path(), "depth.png", &two_object_depth());
    let out = dir.path().join("out");

    depthcast()
        .args(["segment", "--min-area", "100", "--max-objects", "1", "--directed"])
        .arg("--input")
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 regions (0 undersized, 1 dropped)"));
    assert!(!out.join("mask_1.png").exists());
}

#[test]
fn calibrate_writes_homography_and_roi() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut intensity = GrayImage::filled(320, 240, 40);
    fill_rect(&mut intensity, 40..280, 30..210, 230);
    let input = write_png(dir.path(), "white.png", &intensity);
    let out = dir.path().join("cal");

    depthcast()
        .args(["calibrate", "--projector-width", "640", "--projector-height", "360"])
        .arg("--input")
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("calibrated"));

    let roi = load_gray_png(out.join("ROI_mask.png")).expect("roi");
    assert_eq!(roi.get(100, 100), 255);
    assert_eq!(roi.get(5, 5), 0);
    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.join("homography.json")).expect("report"),
    )
    .expect("json");
    assert_eq!(report["target_area"], 240 * 180);
}

#[test]
fn calibrate_reports_missing_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_png(dir.path(), "dark.png", &GrayImage::filled(100, 80, 20));

    depthcast()
        .arg("calibrate")
        .arg("--input")
        .arg(&input)
        .arg("--out")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no calibration target found"));
}

#[test]
fn run_replays_frames_until_quit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    std::fs::create_dir_all(&frames).expect("mkdir");
    write_png(&frames, "000.png", &two_object_depth());
    write_png(&frames, "001.png", &two_object_depth());

    let mut settings = Settings::default();
    settings.projector.width = 160;
    settings.projector.height = 120;
    settings.segmentation.min_area = 100;
    let config = dir.path().join("settings.json");
    settings.write_json(&config).expect("config");
    let summary = dir.path().join("summary.json");

    depthcast()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--replay")
        .arg(&frames)
        .args(["--mode", "regions", "--summary"])
        .arg(&summary)
        .write_stdin("4q\n")
        .timeout(Duration::from_secs(60))
        .assert()
        .success();

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary).expect("summary")).expect("json");
    assert_eq!(summary["final_mode"], "regions");
    assert!(summary["stats"]["frames_rendered"].as_u64().unwrap_or(0) >= 1);
}

#[test]
fn run_without_frames_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    depthcast()
        .arg("run")
        .arg("--replay")
        .arg(dir.path())
        .write_stdin("q\n")
        .timeout(Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no frames found"));
}
