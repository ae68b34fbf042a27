mod common;

use common::{
    mtime_of, set_mtime, write_with_mtime, FakeRepository, Fixture, PROJECT, SESSION_A, SESSION_B,
};
use sessionsync_core::paths::{device_manifest_path, SESSIONS_INDEX_FILE};
use sessionsync_core::{
    CacheState, FileCacheMarker, Manifest, MemoryCacheMarker, SessionSync,
};
use std::fs;

#[test]
fn push_copies_log_aux_directory_and_index() {
    let fixture = Fixture::new();
    fixture.write_local_session(PROJECT, SESSION_A, "{\"type\":\"user\"}\n", 0);
    let project = fixture.environment.projects_directory.join(PROJECT);
    write_with_mtime(
        &project.join(SESSION_A).join("subagents").join("agent-1.jsonl"),
        "{}\n",
        0,
    );
    write_with_mtime(&project.join(SESSIONS_INDEX_FILE), "{\"version\":1}", 0);

    let transport = FakeRepository::new();
    let sync = SessionSync::new(fixture.environment.clone());
    let report = sync.push_sessions(&fixture.repo, "laptop", &transport);

    assert_eq!(report.copied, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);
    assert!(report.commit.committed);
    assert_eq!(
        transport.commit_messages(),
        vec![String::from("sync(laptop): 1 session(s) updated")]
    );

    let remote_project = fixture
        .repo
        .join("devices/laptop/sessions")
        .join(PROJECT);
    assert!(fixture.repo_session_path("laptop", PROJECT, SESSION_A).is_file());
    assert!(remote_project
        .join(SESSION_A)
        .join("subagents")
        .join("agent-1.jsonl")
        .is_file());
    assert!(remote_project.join(SESSIONS_INDEX_FILE).is_file());
    assert_eq!(
        mtime_of(&fixture.repo_session_path("laptop", PROJECT, SESSION_A)),
        mtime_of(&fixture.local_session_path(PROJECT, SESSION_A))
    );
}

#[test]
fn unchanged_sessions_are_skipped_on_the_next_push() {
    let fixture = Fixture::new();
    let local = fixture.write_local_session(PROJECT, SESSION_A, "one\n", 0);
    fixture.write_local_session(PROJECT, SESSION_B, "two\n", 0);

    let transport = FakeRepository::new();
    let sync = SessionSync::new(fixture.environment.clone());
    assert_eq!(sync.push_sessions(&fixture.repo, "laptop", &transport).copied, 2);

    let manifest = Manifest::load(&device_manifest_path(&fixture.repo, "laptop"));
    assert_eq!(manifest.len(), 2);

    let second = sync.push_sessions(&fixture.repo, "laptop", &transport);
    assert_eq!(second.copied, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(transport.commit_messages().len(), 1);

    fs::write(&local, "one\nmore\n").expect("append");
    set_mtime(&local, 60);
    let third = sync.push_sessions(&fixture.repo, "laptop", &transport);
    assert_eq!(third.copied, 1);
    assert_eq!(third.skipped, 1);
}

#[test]
fn failed_push_keeps_copies_and_reports_error() {
    let fixture = Fixture::new();
    fixture.write_local_session(PROJECT, SESSION_A, "one\n", 0);

    let mut transport = FakeRepository::new();
    transport.push_error = Some(String::from("rejected: non-fast-forward"));
    let sync = SessionSync::new(fixture.environment.clone());
    let report = sync.push_sessions(&fixture.repo, "laptop", &transport);

    assert_eq!(report.copied, 1);
    assert!(!report.commit.pushed);
    assert_eq!(
        report.commit.error.as_deref(),
        Some("rejected: non-fast-forward")
    );
    assert!(fixture.repo_session_path("laptop", PROJECT, SESSION_A).is_file());
}

#[test]
fn pull_deploys_new_remote_session_and_invalidates_cache() {
    let fixture = Fixture::new();
    // Own subtree mirrors what is already local.
    fixture.write_local_session(PROJECT, SESSION_B, "mine\n", -7200);
    fixture.write_repo_session("laptop", PROJECT, SESSION_B, "mine\n", -7200);
    fixture.write_repo_session("desktop", PROJECT, SESSION_A, "from desktop\n", -3600);

    let stats = &fixture.environment.stats_cache_file;
    write_with_mtime(stats, "{}", 0);

    let transport = FakeRepository::new();
    let cache = FileCacheMarker::new(stats.clone());
    let sync = SessionSync::new(fixture.environment.clone());
    let report = sync
        .pull_sessions(&fixture.repo, &transport, &cache)
        .expect("pull");

    assert!(report.pulled);
    assert_eq!(report.sessions_copied, 1);
    assert_eq!(report.sessions_skipped, 1);
    assert_eq!(report.devices_seen, vec!["desktop", "laptop"]);
    assert!(report.cache_invalidated);
    assert!(!stats.exists());

    let deployed = fixture.local_session_path(PROJECT, SESSION_A);
    assert_eq!(fs::read_to_string(&deployed).expect("read"), "from desktop\n");

    let index = fixture
        .environment
        .projects_directory
        .join(PROJECT)
        .join(SESSIONS_INDEX_FILE);
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(index).expect("index")).expect("json");
    assert_eq!(value["originalPath"], "/Users/me/app");
    assert_eq!(value["entries"], serde_json::json!([]));
}

#[test]
fn newest_copy_wins_regardless_of_device_order() {
    for (alpha_offset, beta_offset, expected) in [(0, 600, "beta"), (600, 0, "alpha")] {
        let fixture = Fixture::new();
        fixture.write_repo_session("alpha", PROJECT, SESSION_A, "alpha", alpha_offset);
        fixture.write_repo_session("beta", PROJECT, SESSION_A, "beta", beta_offset);

        let cache = MemoryCacheMarker::default();
        let sync = SessionSync::new(fixture.environment.clone());
        sync.pull_sessions(&fixture.repo, &FakeRepository::new(), &cache)
            .expect("pull");

        let local = fixture.local_session_path(PROJECT, SESSION_A);
        assert_eq!(fs::read_to_string(&local).expect("read"), expected);
        assert_eq!(cache.invalidations(), 1);
    }
}

#[test]
fn newer_local_copy_is_kept() {
    let fixture = Fixture::new();
    fixture.write_local_session(PROJECT, SESSION_A, "local edit", 600);
    fixture.write_repo_session("desktop", PROJECT, SESSION_A, "stale", 0);

    let cache = MemoryCacheMarker::default();
    let sync = SessionSync::new(fixture.environment.clone());
    let report = sync
        .pull_sessions(&fixture.repo, &FakeRepository::new(), &cache)
        .expect("pull");

    assert_eq!(report.sessions_copied, 0);
    assert_eq!(report.sessions_skipped, 1);
    assert!(!report.cache_invalidated);
    assert_eq!(cache.invalidations(), 0);
    assert_eq!(
        fs::read_to_string(fixture.local_session_path(PROJECT, SESSION_A)).expect("read"),
        "local edit"
    );
}

#[test]
fn equal_timestamps_keep_the_local_copy() {
    let fixture = Fixture::new();
    fixture.write_local_session(PROJECT, SESSION_A, "local", 0);
    fixture.write_repo_session("desktop", PROJECT, SESSION_A, "remote", 0);

    let cache = MemoryCacheMarker::default();
    let sync = SessionSync::new(fixture.environment.clone());
    let report = sync
        .pull_sessions(&fixture.repo, &FakeRepository::new(), &cache)
        .expect("pull");

    assert_eq!(report.sessions_copied, 0);
    assert_eq!(
        fs::read_to_string(fixture.local_session_path(PROJECT, SESSION_A)).expect("read"),
        "local"
    );
}

#[test]
fn failed_transport_pull_still_merges_local_repository_state() {
    let fixture = Fixture::new();
    fixture.write_repo_session("desktop", PROJECT, SESSION_A, "cached", 0);

    let mut transport = FakeRepository::new();
    transport.pull_ok = false;
    let cache = MemoryCacheMarker::default();
    let sync = SessionSync::new(fixture.environment.clone());
    let report = sync
        .pull_sessions(&fixture.repo, &transport, &cache)
        .expect("pull");

    assert!(!report.pulled);
    assert!(report.error.as_deref().unwrap_or_default().contains("unable to access"));
    assert_eq!(report.sessions_copied, 1);
    assert_eq!(transport.pulls.get(), 1);
}

#[test]
fn missing_cache_marker_is_not_an_error() {
    let fixture = Fixture::new();
    fixture.write_repo_session("desktop", PROJECT, SESSION_A, "remote", 0);

    let cache = FileCacheMarker::new(fixture.environment.stats_cache_file.clone());
    let sync = SessionSync::new(fixture.environment.clone());
    let report = sync
        .pull_sessions(&fixture.repo, &FakeRepository::new(), &cache)
        .expect("pull");

    assert!(report.cache_invalidated);
    cache.invalidate().expect("still a no-op");
}

#[test]
fn pull_without_devices_is_empty() {
    let fixture = Fixture::new();
    let cache = MemoryCacheMarker::default();
    let sync = SessionSync::new(fixture.environment.clone());
    let report = sync
        .pull_sessions(&fixture.repo, &FakeRepository::new(), &cache)
        .expect("pull");

    assert_eq!(report.sessions_copied, 0);
    assert!(report.devices_seen.is_empty());
    assert_eq!(cache.invalidations(), 0);
}
