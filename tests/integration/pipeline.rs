//! Check-cycle scenarios: scan, release selection, version comparison, and
//! checksum pairing against the mock source.

use crate::common::{MockClient, release, tracked_app};
use appkeeper::checker::{CheckOutcome, UpdateChecker};
use appkeeper::compat::CompatibilityDescriptor;
use appkeeper::core::{AppkeeperError, CancelFlag};
use tempfile::TempDir;

fn descriptor() -> CompatibilityDescriptor {
    CompatibilityDescriptor::new("linux", "x86_64")
}

#[tokio::test]
async fn first_install_yields_candidate_with_compatible_asset() {
    let dir = TempDir::new().unwrap();
    let clients = MockClient::clients(vec![release(
        "v1.2.3",
        10,
        false,
        &[
            "app-1.2.3-aarch64.AppImage",
            "app-1.2.3-x86_64.AppImage",
            "SHA256SUMS",
        ],
    )]);
    let descriptor = descriptor();
    let cancel = CancelFlag::new();
    let checker = UpdateChecker::new(&clients, &descriptor, None, &cancel);

    let outcome = checker.check(&tracked_app("app", dir.path())).await.unwrap();
    let CheckOutcome::Candidate(candidate) = outcome else {
        panic!("expected a candidate on first install");
    };
    assert!(candidate.current.is_none());
    assert_eq!(candidate.latest.as_str(), "1.2.3");
    assert_eq!(candidate.asset.name, "app-1.2.3-x86_64.AppImage");
    assert_eq!(
        candidate.checksum_asset.as_ref().map(|a| a.name.as_str()),
        Some("SHA256SUMS")
    );
}

#[tokio::test]
async fn matching_installed_version_is_up_to_date() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app-1.2.3-x86_64.AppImage.current"), b"v1").unwrap();
    let clients = MockClient::clients(vec![release(
        "v1.2.3",
        10,
        false,
        &["app-1.2.3-x86_64.AppImage"],
    )]);
    let descriptor = descriptor();
    let cancel = CancelFlag::new();
    let checker = UpdateChecker::new(&clients, &descriptor, None, &cancel);

    let outcome = checker.check(&tracked_app("app", dir.path())).await.unwrap();
    let CheckOutcome::UpToDate { current } = outcome else {
        panic!("expected up to date");
    };
    assert_eq!(current.map(|v| v.to_string()).as_deref(), Some("1.2.3"));
}

#[tokio::test]
async fn newer_release_yields_candidate() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app-1.2.3-x86_64.AppImage.current"), b"v1").unwrap();
    let clients = MockClient::clients(vec![
        release("v1.2.3", 10, false, &["app-1.2.3-x86_64.AppImage"]),
        release("v1.3.0", 20, false, &["app-1.3.0-x86_64.AppImage"]),
    ]);
    let descriptor = descriptor();
    let cancel = CancelFlag::new();
    let checker = UpdateChecker::new(&clients, &descriptor, None, &cancel);

    let outcome = checker.check(&tracked_app("app", dir.path())).await.unwrap();
    let CheckOutcome::Candidate(candidate) = outcome else {
        panic!("expected a candidate");
    };
    assert_eq!(candidate.current.as_ref().map(|v| v.as_str()), Some("1.2.3"));
    assert_eq!(candidate.latest.as_str(), "1.3.0");
    assert_eq!(candidate.asset.name, "app-1.3.0-x86_64.AppImage");
}

#[tokio::test]
async fn unrelated_prefix_sharing_file_does_not_mask_an_update() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app-1.0.0-x86_64.AppImage.current"), b"v1").unwrap();
    // Another tool whose name extends this one's must not count as an
    // installed version, however high its version reads.
    std::fs::write(dir.path().join("appfoo-9.9.9-x86_64.AppImage"), b"other").unwrap();
    let clients = MockClient::clients(vec![release(
        "v2.0.0",
        30,
        false,
        &["app-2.0.0-x86_64.AppImage"],
    )]);
    let descriptor = descriptor();
    let cancel = CancelFlag::new();
    let checker = UpdateChecker::new(&clients, &descriptor, None, &cancel);

    let outcome = checker.check(&tracked_app("app", dir.path())).await.unwrap();
    let CheckOutcome::Candidate(candidate) = outcome else {
        panic!("expected a candidate");
    };
    assert_eq!(candidate.current.as_ref().map(|v| v.as_str()), Some("1.0.0"));
    assert_eq!(candidate.latest.as_str(), "2.0.0");
}

#[tokio::test]
async fn rotated_siblings_do_not_count_as_installed_versions() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app-1.3.0-x86_64.AppImage.current"), b"v2").unwrap();
    // A newer-looking version in an .old slot must not mask the current one.
    std::fs::write(dir.path().join("app-9.9.9-x86_64.AppImage.old"), b"junk").unwrap();
    let clients = MockClient::clients(vec![release(
        "v1.3.0",
        20,
        false,
        &["app-1.3.0-x86_64.AppImage"],
    )]);
    let descriptor = descriptor();
    let cancel = CancelFlag::new();
    let checker = UpdateChecker::new(&clients, &descriptor, None, &cancel);

    let outcome = checker.check(&tracked_app("app", dir.path())).await.unwrap();
    assert!(matches!(outcome, CheckOutcome::UpToDate { .. }));
}

#[tokio::test]
async fn required_checksum_without_sums_asset_fails() {
    let dir = TempDir::new().unwrap();
    let clients = MockClient::clients(vec![release(
        "v1.2.3",
        10,
        false,
        &["app-1.2.3-x86_64.AppImage"],
    )]);
    let descriptor = descriptor();
    let cancel = CancelFlag::new();
    let checker = UpdateChecker::new(&clients, &descriptor, None, &cancel);

    let mut app = tracked_app("app", dir.path());
    app.checksum.required = true;
    let err = checker.check(&app).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AppkeeperError>(),
        Some(AppkeeperError::ChecksumUnavailable { .. })
    ));
}

#[tokio::test]
async fn prereleases_are_excluded_unless_opted_in() {
    let dir = TempDir::new().unwrap();
    let releases = vec![
        release("v1.2.3", 10, false, &["app-1.2.3-x86_64.AppImage"]),
        release("v2.0.0-rc.1", 20, true, &["app-2.0.0-rc.1-x86_64.AppImage"]),
    ];
    let descriptor = descriptor();
    let cancel = CancelFlag::new();

    let clients = MockClient::clients(releases.clone());
    let checker = UpdateChecker::new(&clients, &descriptor, None, &cancel);
    let outcome = checker.check(&tracked_app("app", dir.path())).await.unwrap();
    let CheckOutcome::Candidate(candidate) = outcome else {
        panic!("expected a candidate");
    };
    assert_eq!(candidate.latest.as_str(), "1.2.3");

    let clients = MockClient::clients(releases);
    let checker = UpdateChecker::new(&clients, &descriptor, None, &cancel);
    let mut app = tracked_app("app", dir.path());
    app.prerelease = true;
    let CheckOutcome::Candidate(candidate) = checker.check(&app).await.unwrap() else {
        panic!("expected a candidate");
    };
    assert_eq!(candidate.asset.name, "app-2.0.0-rc.1-x86_64.AppImage");
}

#[tokio::test]
async fn unsupported_source_url_is_rejected() {
    let dir = TempDir::new().unwrap();
    let clients = MockClient::clients(vec![]);
    let descriptor = descriptor();
    let cancel = CancelFlag::new();
    let checker = UpdateChecker::new(&clients, &descriptor, None, &cancel);

    let mut app = tracked_app("app", dir.path());
    app.url = "ftp://example.com/app".to_string();
    let err = checker.check(&app).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AppkeeperError>(),
        Some(AppkeeperError::UnsupportedSource { .. })
    ));
}

#[tokio::test]
async fn cancelled_flag_stops_the_check() {
    let dir = TempDir::new().unwrap();
    let clients = MockClient::clients(vec![]);
    let descriptor = descriptor();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let checker = UpdateChecker::new(&clients, &descriptor, None, &cancel);

    let err = checker.check(&tracked_app("app", dir.path())).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AppkeeperError>(),
        Some(AppkeeperError::Cancelled)
    ));
}
