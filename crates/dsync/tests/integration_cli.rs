//! Integration tests for the dsync CLI

use assert_cmd::cargo;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Point the CLI at a throwaway home so the user's pipelines are never read.
fn dsync(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo::cargo_bin_cmd!("dsync");
    cmd.env("DROIDSYNC_HOME", home.path())
        .env_remove("DROIDSYNC_ADB")
        .env_remove("DROIDSYNC_POLL_SECS")
        .env_remove("DROIDSYNC_LOG")
        .current_dir(home.path());
    cmd
}

fn pipelines_file(home: &TempDir) -> PathBuf {
    home.path().join(".config/droidsync/pipelines.json")
}

fn add_pipeline(home: &TempDir, name: &str, local: &Path, extra: &[&str]) {
    dsync(home)
        .args(["pipeline", "add", name, "--device", "/sdcard/Backup", "--local"])
        .arg(local)
        .args(extra)
        .assert()
        .success()
        .stdout(contains(format!("Created pipeline '{name}'")));
}

#[test]
fn test_add_and_list_pipelines() {
    let home = TempDir::new().unwrap();
    let local = home.path().join("photos");
    fs::create_dir_all(&local).unwrap();

    add_pipeline(
        &home,
        "photos",
        &local,
        &["--include", "JPG,png", "--auto", "--within-days", "30"],
    );

    dsync(&home)
        .args(["pipeline", "list"])
        .assert()
        .success()
        .stdout(contains("photos").and(contains("local_to_device")));

    let output = dsync(&home)
        .args(["pipeline", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let first = &listed[0];
    assert_eq!(first["name"], "photos");
    assert_eq!(first["autoSync"], true);
    assert_eq!(first["modifiedWithinDays"], 30);
    assert_eq!(first["includeExtensions"], serde_json::json!([".jpg", ".png"]));

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(pipelines_file(&home)).unwrap()).unwrap();
    assert_eq!(on_disk["version"], "2.0");
    assert_eq!(on_disk["pipelines"][0]["name"], "photos");
}

#[test]
fn test_duplicate_name_is_rejected() {
    let home = TempDir::new().unwrap();
    add_pipeline(&home, "docs", home.path(), &[]);

    dsync(&home)
        .args(["pipeline", "add", "docs", "--local", ".", "--device", "/sdcard/Other"])
        .assert()
        .failure()
        .stderr(contains("already exists"));
}

#[test]
fn test_invalid_direction_is_rejected() {
    let home = TempDir::new().unwrap();
    dsync(&home)
        .args([
            "pipeline",
            "add",
            "docs",
            "--local",
            ".",
            "--device",
            "/sdcard/Docs",
            "--direction",
            "sideways",
        ])
        .assert()
        .failure()
        .stderr(contains("sideways"));
}

#[test]
fn test_toggle_auto_sync_and_remove() {
    let home = TempDir::new().unwrap();
    add_pipeline(&home, "music", home.path(), &["--auto"]);

    dsync(&home)
        .args(["pipeline", "auto", "music", "off"])
        .assert()
        .success()
        .stdout(contains("Auto-sync for 'music' is off"));

    dsync(&home)
        .args(["pipeline", "show", "music"])
        .assert()
        .success()
        .stdout(contains("\"autoSync\": false"));

    dsync(&home)
        .args(["pipeline", "remove", "music"])
        .assert()
        .success();

    dsync(&home)
        .args(["pipeline", "list"])
        .assert()
        .success()
        .stdout(contains("No pipelines"));
}

#[test]
fn test_plugin_config_is_stored() {
    let home = TempDir::new().unwrap();
    add_pipeline(
        &home,
        "periods",
        home.path(),
        &[
            "--plugin",
            "date_interval",
            "--plugin-config",
            "interval_days=7",
            "--plugin-config",
            "date_format=%Y-%m-%d",
        ],
    );

    let output = dsync(&home)
        .args(["pipeline", "show", "periods"])
        .output()
        .unwrap();
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["plugin"], "date_interval");
    assert_eq!(shown["pluginConfig"]["interval_days"], 7);
    assert_eq!(shown["pluginConfig"]["date_format"], "%Y-%m-%d");
}

#[test]
fn test_plugins_lists_builtins() {
    let home = TempDir::new().unwrap();
    dsync(&home)
        .arg("plugins")
        .assert()
        .success()
        .stdout(contains("date_interval").and(contains("prefer_side")));
}

#[test]
fn test_sync_unknown_pipeline_fails() {
    let home = TempDir::new().unwrap();
    dsync(&home)
        .args(["sync", "nope"])
        .assert()
        .failure()
        .stderr(contains("Pipeline 'nope' not found"));
}

#[test]
fn test_devices_with_missing_adb_fails() {
    let home = TempDir::new().unwrap();
    dsync(&home)
        .args(["devices", "--adb", "/nonexistent/platform-tools/adb"])
        .assert()
        .failure()
        .stderr(contains("Cannot list devices"));
}

#[cfg(unix)]
mod fake_adb {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Device FAKE01 is attached and has no /sdcard/Backup folder.
    fn install(home: &TempDir) -> PathBuf {
        let script = home.path().join("adb");
        fs::write(
            &script,
            "#!/bin/sh\n\
             case \"$1\" in\n\
             devices) printf 'List of devices attached\\nFAKE01\\tdevice\\n' ;;\n\
             *) echo \"find: '/sdcard/Backup': No such file or directory\" >&2; exit 1 ;;\n\
             esac\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[test]
    fn test_devices_lists_attached_serials() {
        let home = TempDir::new().unwrap();
        let adb = install(&home);

        dsync(&home)
            .arg("devices")
            .arg("--adb")
            .arg(&adb)
            .assert()
            .success()
            .stdout(contains("FAKE01"));

        dsync(&home)
            .env("DROIDSYNC_ADB", &adb)
            .args(["devices", "--json"])
            .assert()
            .success()
            .stdout(contains("[\n  \"FAKE01\"\n]"));
    }

    #[test]
    fn test_dry_run_plans_root_creation_and_pushes() {
        let home = TempDir::new().unwrap();
        let adb = install(&home);
        let local = home.path().join("docs");
        fs::create_dir_all(local.join("sub")).unwrap();
        fs::write(local.join("a.txt"), "a").unwrap();
        fs::write(local.join("sub/b.txt"), "b").unwrap();
        add_pipeline(&home, "docs", &local, &[]);

        dsync(&home)
            .env("DROIDSYNC_ADB", &adb)
            .args(["sync", "docs", "--dry-run"])
            .assert()
            .success()
            .stdout(
                contains("on FAKE01")
                    .and(contains("mkdir  /sdcard/Backup"))
                    .and(contains("/sdcard/Backup/sub/b.txt"))
                    .and(contains("2 mkdir, 2 push, 0 pull")),
            );
    }

    #[test]
    fn test_dry_run_json_is_a_plan() {
        let home = TempDir::new().unwrap();
        let adb = install(&home);
        let local = home.path().join("docs");
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join("a.txt"), "a").unwrap();
        add_pipeline(&home, "docs", &local, &[]);

        let output = dsync(&home)
            .env("DROIDSYNC_ADB", &adb)
            .args(["sync", "docs", "--dry-run", "--json", "--serial", "FAKE01"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(plan["summary"]["pushes"], 1);
        assert_eq!(plan["operations"][0]["op"], "mkdir");
    }

    #[test]
    fn test_pull_pipeline_with_missing_device_folder_fails() {
        let home = TempDir::new().unwrap();
        let adb = install(&home);
        add_pipeline(
            &home,
            "camera",
            &home.path().join("camera"),
            &["--direction", "device_to_local"],
        );

        dsync(&home)
            .env("DROIDSYNC_ADB", &adb)
            .args(["sync", "camera", "--dry-run"])
            .assert()
            .failure()
            .stderr(contains("cannot plan 'camera'"));
    }
}
