use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_config(xml: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp config");
    tmp.write_all(xml.as_bytes()).expect("write config");
    tmp
}

#[test]
fn headless_run_prints_rest_state_and_tears_down() {
    let mut cmd = Command::cargo_bin("hero-scene").expect("binary exists");
    cmd.args(["--headless", "--frames", "120", "--seed", "1"]);
    cmd.assert()
        .success()
        .stdout(contains("Frames rendered: 120"))
        .stdout(contains("Camera pos=(0.00, 0.00, 5.00) aspect=1.778"))
        .stdout(contains("Scroll target=0.0 smoothed=0.0"))
        .stdout(contains(
            " - torus pos=(-3.00, 0.00, -3.00) opacity=0.30 emissive=0.00 scale=1.00 hovered=false",
        ))
        .stdout(contains(" - sphere pos=(4.00,"))
        .stdout(contains("Torn down: 0 listener(s) remain, cursor=default"));
}

#[test]
fn scroll_pulls_the_camera_in() {
    let mut cmd = Command::cargo_bin("hero-scene").expect("binary exists");
    cmd.args([
        "--headless", "--frames", "600", "--scroll", "400", "--width", "800", "--height", "600",
    ]);
    cmd.assert()
        .success()
        .stdout(contains("Camera pos=(0.00, 0.00, 2.00) aspect=1.333"))
        .stdout(contains("Scroll target=400.0 smoothed=400.0"));
}

#[test]
fn config_file_overrides_shape_position() {
    let config = write_config(
        r#"<hero>
  <seed>3</seed>
  <shape>
    <name>torus</name>
    <position>-2 0 -3</position>
  </shape>
</hero>
"#,
    );
    let mut cmd = Command::cargo_bin("hero-scene").expect("binary exists");
    cmd.arg("--headless")
        .arg("--frames")
        .arg("10")
        .arg("--config")
        .arg(config.path());
    cmd.assert()
        .success()
        .stdout(contains("Frames rendered: 10"))
        .stdout(contains(" - torus pos=(-2.00, 0.00, -3.00)"));
}

#[test]
fn invalid_config_fails() {
    let config = write_config("<hero><shape><name>cube</name></shape></hero>");
    let mut cmd = Command::cargo_bin("hero-scene").expect("binary exists");
    cmd.arg("--headless").arg("--config").arg(config.path());
    cmd.assert()
        .failure()
        .stderr(contains("failed to parse config"));
}

#[test]
fn unknown_flag_fails() {
    let mut cmd = Command::cargo_bin("hero-scene").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --summary-only"));
}
