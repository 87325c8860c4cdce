//! Install round trips: rotation, sidecar-backed version detection, and the
//! stable symlink across repeated updates.

use crate::common::{MockClient, release, tracked_app};
use appkeeper::checker::{self, CheckOutcome, UpdateChecker};
use appkeeper::compat::CompatibilityDescriptor;
use appkeeper::config::Settings;
use appkeeper::core::CancelFlag;
use appkeeper::download::DownloadOrchestrator;
use appkeeper::net;
use appkeeper::rotation::{InstallRequest, RotationManager, Sidecar};
use chrono::Utc;
use std::path::Path;
use tempfile::TempDir;

/// Stage a fake downloaded artifact and rotate it into place. The base name
/// carries no version; detection must come from the sidecar.
fn install_version(dir: &Path, version: &str, symlink: Option<&Path>) {
    let temp = dir.join(format!(".stage-{version}"));
    std::fs::write(&temp, version).unwrap();
    RotationManager::install(&InstallRequest {
        temp_path: &temp,
        target_dir: dir,
        base_name: "app.AppImage",
        rotate: true,
        retain: 3,
        symlink,
        sidecar: Some(Sidecar {
            version: version.to_string(),
            title: format!("Release {version}"),
            installed_at: Utc::now(),
        }),
    })
    .unwrap();
}

#[test]
fn repeated_installs_rotate_and_track_the_sidecar_version() {
    let dir = TempDir::new().unwrap();
    let app = tracked_app("app", dir.path());

    for version in ["1.0.0", "1.1.0", "1.2.0", "1.3.0"] {
        install_version(dir.path(), version, None);
        let detected = checker::scan_installed(&app).unwrap();
        assert_eq!(detected.map(|v| v.to_string()).as_deref(), Some(version));
    }

    // Retain 3: current + two old slots, oldest dropped.
    assert_eq!(read(dir.path(), "app.AppImage.current"), "1.3.0");
    assert_eq!(read(dir.path(), "app.AppImage.old"), "1.2.0");
    assert_eq!(read(dir.path(), "app.AppImage.old2"), "1.1.0");
    assert!(!dir.path().join("app.AppImage.old3").exists());
    assert!(!dir.path().join("app.AppImage").exists());
}

#[test]
fn only_the_current_slot_carries_a_sidecar() {
    let dir = TempDir::new().unwrap();
    install_version(dir.path(), "1.0.0", None);
    install_version(dir.path(), "1.1.0", None);

    assert!(dir.path().join("app.AppImage.current.info").exists());
    assert!(!dir.path().join("app.AppImage.old.info").exists());

    let current = Sidecar::read(&dir.path().join("app.AppImage.current")).unwrap();
    assert_eq!(current.version, "1.1.0");
    assert_eq!(current.title, "Release 1.1.0");
}

#[cfg(unix)]
#[test]
fn symlink_stays_on_current_across_updates() {
    let dir = TempDir::new().unwrap();
    let link = dir.path().join("app");

    install_version(dir.path(), "1.0.0", Some(&link));
    assert_eq!(std::fs::read_to_string(&link).unwrap(), "1.0.0");

    install_version(dir.path(), "1.1.0", Some(&link));
    assert_eq!(
        std::fs::read_link(&link).unwrap(),
        dir.path().join("app.AppImage.current")
    );
    assert_eq!(std::fs::read_to_string(&link).unwrap(), "1.1.0");
}

#[test]
fn scan_prefers_the_sidecar_over_an_unparsable_filename() {
    let dir = TempDir::new().unwrap();
    let app = tracked_app("app", dir.path());
    install_version(dir.path(), "2.4.1", None);

    // `app.AppImage` yields no version on its own; the sidecar decides.
    let detected = checker::scan_installed(&app).unwrap();
    assert_eq!(detected.map(|v| v.to_string()).as_deref(), Some("2.4.1"));
}

#[tokio::test]
async fn an_up_to_date_cycle_leaves_the_directory_untouched() {
    let dir = TempDir::new().unwrap();
    install_version(dir.path(), "1.2.3", None);

    let clients = MockClient::clients(vec![release(
        "v1.2.3",
        10,
        false,
        &["app-1.2.3-x86_64.AppImage"],
    )]);
    let descriptor = CompatibilityDescriptor::new("linux", "x86_64");
    let cancel = CancelFlag::new();
    let checker = UpdateChecker::new(&clients, &descriptor, None, &cancel);
    let app = tracked_app("app", dir.path());

    let outcome = checker.check(&app).await.unwrap();
    assert!(matches!(outcome, CheckOutcome::UpToDate { .. }));
    let before = snapshot(dir.path());

    // Second full cycle: same verdict, an empty download stage, and a
    // byte-for-byte identical directory.
    let outcome = checker.check(&app).await.unwrap();
    assert!(matches!(outcome, CheckOutcome::UpToDate { .. }));
    let settings = Settings::default();
    let client = net::build_client(&settings).unwrap();
    let orchestrator = DownloadOrchestrator::new(&client, &settings, &cancel);
    let results = orchestrator.run(Vec::new()).await;
    assert!(results.is_empty());
    assert_eq!(snapshot(dir.path()), before);
}

fn read(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap()
}

/// Name, content, and mtime of every directory entry, sorted.
fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>, std::time::SystemTime)> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            let modified = entry.metadata().unwrap().modified().unwrap();
            (
                entry.file_name().to_string_lossy().to_string(),
                std::fs::read(entry.path()).unwrap(),
                modified,
            )
        })
        .collect();
    entries.sort();
    entries
}
