use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn beamshade(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_beamshade"));
    command.env("BEAMSHADE_CONFIG_DIR", config_dir);
    command.env_remove("RUST_LOG");
    command
}

#[test]
fn config_command_prints_defaults_as_json() {
    let root = TempDir::new().unwrap();

    let output = beamshade(root.path())
        .arg("config")
        .output()
        .expect("failed to run beamshade config");

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["version"], 1);
    assert_eq!(json["window"]["title"], "beamshade");
    assert_eq!(json["gpu"]["power"], "low");
    assert_eq!(json["render"]["slow_frame"], "50ms");
}

#[test]
fn config_command_merges_file_and_flags() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("config.toml"),
        "version = 1\n[window]\ntitle = \"lobby\"\n[render]\nfps = 30\n",
    )
    .unwrap();

    let output = beamshade(root.path())
        .args(["--fps", "24", "--gpu-power", "high", "config"])
        .output()
        .expect("failed to run beamshade config");

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["window"]["title"], "lobby");
    assert_eq!(json["render"]["fps"], 24.0);
    assert_eq!(json["gpu"]["power"], "high");
}

#[test]
fn invalid_config_file_fails() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("config.toml"), "version = 7\n").unwrap();

    let status = beamshade(root.path())
        .arg("config")
        .status()
        .expect("failed to run beamshade config");

    assert!(!status.success());
}

#[test]
fn still_command_writes_png() {
    let root = TempDir::new().unwrap();
    let out = root.path().join("frames/still.png");

    let status = beamshade(root.path())
        .args(["still", "--time", "2.5", "--size", "48x27", "--out"])
        .arg(&out)
        .status()
        .expect("failed to run beamshade still");

    assert!(status.success());
    let bytes = fs::read(&out).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn where_command_reports_config_location() {
    let root = TempDir::new().unwrap();

    let output = beamshade(root.path())
        .arg("where")
        .output()
        .expect("failed to run beamshade where");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains(&root.path().display().to_string()));
    assert!(stdout.contains("config.toml (missing)"));
}
