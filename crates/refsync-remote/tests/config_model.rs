//! Registry construction from configuration pairs and from the legacy
//! descriptor files.

use std::fs;

use refsync_remote::{RemoteRegistry, TagFollow};

#[test]
fn legacy_remotes_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("remotes")).unwrap();
    fs::write(
        dir.path().join("remotes/upstream"),
        "URL: https://example.com/up.git\n\
         Push: refs/heads/main:refs/heads/main\n\
         Pull: +refs/heads/*:refs/remotes/upstream/*\n\
         Pull:\n\
         # stray line\n",
    )
    .unwrap();

    let mut reg = RemoteRegistry::new(Some(dir.path().to_path_buf()));
    let r = reg.remote_get(Some("upstream"));
    assert_eq!(r.urls, vec!["https://example.com/up.git"]);
    assert_eq!(r.push.len(), 1);
    assert_eq!(r.fetch.len(), 1);
    assert!(r.fetch[0].pattern);
    assert_eq!(r.fetch_tags, TagFollow::Auto);
}

#[test]
fn legacy_branches_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("branches")).unwrap();
    fs::write(
        dir.path().join("branches/old"),
        "https://example.com/old.git#topic\n",
    )
    .unwrap();

    let mut reg = RemoteRegistry::new(Some(dir.path().to_path_buf()));
    let r = reg.remote_get(Some("old"));
    assert_eq!(r.urls, vec!["https://example.com/old.git"]);
    assert_eq!(r.fetch[0].src, "refs/heads/topic");
    assert_eq!(r.fetch_tags, TagFollow::All);
}

#[test]
fn legacy_branches_file_defaults_to_master() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("branches")).unwrap();
    fs::write(dir.path().join("branches/old"), "https://example.com/o\n").unwrap();

    let mut reg = RemoteRegistry::new(Some(dir.path().to_path_buf()));
    let r = reg.remote_get(Some("old"));
    assert_eq!(r.fetch[0].src, "refs/heads/master");
}

#[test]
fn branches_file_slash_suffix_extends_url() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("branches")).unwrap();
    fs::write(dir.path().join("branches/old"), "https://example.com\n").unwrap();

    let mut reg = RemoteRegistry::new(Some(dir.path().to_path_buf()));
    let r = reg.remote_get(Some("old/sub"));
    assert_eq!(r.urls, vec!["https://example.com/sub"]);
}

#[test]
fn config_wins_over_legacy_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("remotes")).unwrap();
    fs::write(dir.path().join("remotes/origin"), "URL: legacy\n").unwrap();

    let mut reg = RemoteRegistry::new(Some(dir.path().to_path_buf()));
    reg.handle_config("remote.origin.url", Some("configured"));
    let r = reg.remote_get(Some("origin"));
    assert_eq!(r.urls, vec!["configured"]);
}

#[test]
fn unknown_sections_and_subkeys_are_ignored() {
    let mut reg = RemoteRegistry::new(None);
    reg.handle_config("core.bare", Some("false"));
    reg.handle_config("remote.origin.color", Some("red"));
    reg.handle_config("branch.main.rebase", Some("true"));
    assert!(reg.warnings().is_empty());
}
