//! CLI Integration Tests
//!
//! End-to-end runs of the command handlers over a real temp repository:
//! init, tag edits inside a transaction, transaction opening with hooks
//! and whitelist gating.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use caspub::cli::{init, tag, transaction, TagInvocation};
use caspub::errors::ErrorKind;
use caspub::gateway::SessionToken;
use caspub::history::{JsonTagStore, TagHistoryStore};

fn write_settings(dir: &TempDir, extra: &str) -> PathBuf {
    let data_dir = dir.path().join("repo");
    let config = dir.path().join("caspub.json");
    fs::write(
        &config,
        format!(
            r#"{{"repository": "sw.example.org", "data_dir": "{}"{}{}}}"#,
            data_dir.display(),
            if extra.is_empty() { "" } else { ", " },
            extra
        ),
    )
    .unwrap();
    config
}

fn tag_invocation(config: &PathBuf) -> TagInvocation {
    TagInvocation {
        repository: "sw.example.org".to_string(),
        config: config.clone(),
        add: None,
        channel: None,
        message: None,
        hash: None,
        remove: None,
        inspect: None,
        branches: false,
        list: false,
        force: false,
        machine_readable: false,
    }
}

#[test]
fn test_init_then_double_init_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_settings(&dir, "");

    assert_eq!(init(&config).unwrap(), 0);
    let err = init(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn test_tag_add_and_remove_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = write_settings(&dir, "");
    init(&config).unwrap();

    let mut invocation = tag_invocation(&config);
    invocation.add = Some("v1".to_string());
    invocation.message = Some("first release".to_string());
    assert_eq!(tag(invocation).unwrap(), 0);

    let history =
        JsonTagStore::open(&dir.path().join("repo").join("history.json")).unwrap();
    assert!(history.exists("v1"));
    assert_eq!(history.get("v1").unwrap().description, "first release");

    let mut invocation = tag_invocation(&config);
    invocation.remove = Some("v1".to_string());
    invocation.force = true;
    assert_eq!(tag(invocation).unwrap(), 0);

    let history =
        JsonTagStore::open(&dir.path().join("repo").join("history.json")).unwrap();
    assert!(!history.exists("v1"));
}

#[test]
fn test_tag_add_with_reserved_name_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_settings(&dir, "");
    init(&config).unwrap();

    let mut invocation = tag_invocation(&config);
    invocation.add = Some("trunk".to_string());
    let err = tag(invocation).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn test_tag_add_with_invalid_hash_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_settings(&dir, "");
    init(&config).unwrap();

    let mut invocation = tag_invocation(&config);
    invocation.add = Some("v1".to_string());
    invocation.hash = Some("zz-not-hex".to_string());
    let err = tag(invocation).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn test_tag_edit_requires_free_lease() {
    let dir = TempDir::new().unwrap();
    let config = write_settings(&dir, r#""transaction": {"retry_timeout_s": -1}"#);
    init(&config).unwrap();

    // Another writer process holds the repository lease
    let lock = dir.path().join("repo").join("spool").join("session.lease");
    fs::write(&lock, SessionToken::issue("", 300).encode().unwrap()).unwrap();

    let mut invocation = tag_invocation(&config);
    invocation.add = Some("v1".to_string());
    let err = tag(invocation).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LeaseBusy);

    // The edit never reached the history
    let history =
        JsonTagStore::open(&dir.path().join("repo").join("history.json")).unwrap();
    assert!(!history.exists("v1"));
}

#[test]
fn test_gateway_published_repository_is_refused() {
    let dir = TempDir::new().unwrap();
    let config = write_settings(
        &dir,
        r#""gateway_url": "http://gw.example.org:4929/api/v1""#,
    );
    init(&config).unwrap();

    let mut invocation = tag_invocation(&config);
    invocation.list = true;
    let err = tag(invocation).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RepositoryType);
}

#[test]
fn test_unknown_repository_is_not_found() {
    let dir = TempDir::new().unwrap();
    let config = write_settings(&dir, "");
    init(&config).unwrap();

    let mut invocation = tag_invocation(&config);
    invocation.repository = "other.example.org".to_string();
    invocation.list = true;
    let err = tag(invocation).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RepositoryNotFound);
}

#[test]
fn test_transaction_opens_and_holds_lease() {
    let dir = TempDir::new().unwrap();
    let config = write_settings(&dir, "");
    init(&config).unwrap();

    assert_eq!(
        transaction("sw.example.org", &config, Some(5), None, None, None).unwrap(),
        0
    );
    assert!(dir
        .path()
        .join("repo")
        .join("spool")
        .join("session.lease")
        .exists());
}

#[test]
fn test_transaction_on_missing_path_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_settings(&dir, "");
    init(&config).unwrap();

    let err = transaction(
        "sw.example.org/not/there",
        &config,
        Some(-1),
        None,
        None,
        None,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LeaseNoEntry);
}

#[test]
fn test_transaction_template_flag_combinations() {
    let dir = TempDir::new().unwrap();
    let config = write_settings(&dir, "");
    init(&config).unwrap();

    // from without to
    let err = transaction("sw.example.org", &config, None, None, Some("/a"), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);

    // --template together with --template-from/to
    let err = transaction(
        "sw.example.org",
        &config,
        None,
        Some("/a=/b"),
        Some("/a"),
        Some("/b"),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);

    // malformed --template value
    let err =
        transaction("sw.example.org", &config, None, Some("no-equals"), None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn test_expired_whitelist_blocks_transaction() {
    let dir = TempDir::new().unwrap();
    let config = write_settings(&dir, r#""whitelist_expiry": "2001-01-01T00:00:00Z""#);
    init(&config).unwrap();

    let err = transaction("sw.example.org", &config, None, None, None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WhitelistExpired);
}

#[test]
fn test_failing_before_hook_vetoes_transaction() {
    let dir = TempDir::new().unwrap();
    let hook = dir.path().join("hooks.sh");
    fs::write(
        &hook,
        "#!/bin/sh\nif [ \"$1\" = transaction_before_hook ]; then exit 7; fi\nexit 0\n",
    )
    .unwrap();
    let config = write_settings(
        &dir,
        &format!(r#""hooks_script": "{}""#, hook.display()),
    );
    init(&config).unwrap();

    assert_eq!(
        transaction("sw.example.org", &config, None, None, None, None).unwrap(),
        7
    );
    // Vetoed before opening: no lease was taken
    assert!(!dir
        .path()
        .join("repo")
        .join("spool")
        .join("session.lease")
        .exists());
}

#[test]
fn test_auto_managed_mount_is_refused() {
    let dir = TempDir::new().unwrap();
    let config = write_settings(&dir, r#""auto_managed_mount": true"#);
    init(&config).unwrap();

    let err = transaction("sw.example.org", &config, None, None, None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invocation);
}
