//! End-to-end janitor runs against real bundle trees on disk.

use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use bundle_janitor::authority::{HttpAuthority, MemoryAuthority};
use bundle_janitor::core::paths::{db_filename, dbs_dir, uploads_dir};
use bundle_janitor::janitor::{FreeSpaceOutcome, Janitor, JanitorOpts};
use bundle_janitor::logger::activity::ActivityLoggerHandle;
use bundle_janitor::platform::capacity::FixedCapacityProbe;
use filetime::{FileTime, set_file_mtime};

fn bundle() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir(uploads_dir(dir.path())).expect("uploads dir");
    fs::create_dir(dbs_dir(dir.path())).expect("dbs dir");
    dir
}

fn opts(root: &Path, percent: u8) -> JanitorOpts {
    JanitorOpts {
        bundle_dir: root.to_path_buf(),
        desired_percent_free: percent,
        max_unconverted_upload_age: Duration::from_secs(3600),
    }
}

fn upload_aged(root: &Path, name: &str, age: Duration) -> PathBuf {
    let path = uploads_dir(root).join(name);
    fs::write(&path, b"raw upload").expect("write upload");
    set_file_mtime(&path, FileTime::from_system_time(SystemTime::now() - age)).expect("mtime");
    path
}

fn dump(root: &Path, id: i64, size: usize) -> PathBuf {
    let path = db_filename(root, id);
    fs::write(&path, vec![0_u8; size]).expect("write dump");
    path
}

#[test]
fn stale_upload_scenario() {
    let dir = bundle();
    let young = upload_aged(dir.path(), "young.lsif.gz", Duration::from_secs(10 * 60));
    let old = upload_aged(dir.path(), "old.lsif.gz", Duration::from_secs(2 * 3600));

    let mut janitor = Janitor::new(opts(dir.path(), 0), Arc::new(MemoryAuthority::new()))
        .with_disk_probe(Box::new(FixedCapacityProbe::new(1000, 1000)));
    let report = janitor.run().expect("run");

    assert_eq!(report.uploads_removed, 1);
    assert!(young.exists());
    assert!(!old.exists());
}

#[test]
fn dead_dump_scenario() {
    let dir = bundle();
    for id in [1, 2, 3] {
        dump(dir.path(), id, 8);
    }
    let authority = Arc::new(
        MemoryAuthority::new()
            .with_state(1, "completed")
            .with_state(2, "errored"),
    );

    let mut janitor = Janitor::new(opts(dir.path(), 0), authority)
        .with_disk_probe(Box::new(FixedCapacityProbe::new(1000, 1000)));
    let report = janitor.run().expect("run");

    assert_eq!(report.dead_dumps_removed, 2);
    assert!(db_filename(dir.path(), 1).exists());
    assert!(!db_filename(dir.path(), 2).exists());
    assert!(!db_filename(dir.path(), 3).exists());
}

#[test]
fn free_space_scenario_stops_after_covering_the_deficit() {
    let dir = bundle();
    let a = dump(dir.path(), 10, 60);
    let b = dump(dir.path(), 11, 60);
    let authority = Arc::new(
        MemoryAuthority::new()
            .with_state(10, "completed")
            .with_state(11, "completed")
            .with_prune_order([10, 11]),
    );

    let mut janitor = Janitor::new(opts(dir.path(), 10), authority.clone())
        .with_disk_probe(Box::new(FixedCapacityProbe::new(1000, 50)));
    let report = janitor.run().expect("run");

    assert!(!a.exists());
    assert!(b.exists(), "must not evict more than needed");
    assert_eq!(authority.prune_calls(), 1);
    assert_eq!(report.free_space, FreeSpaceOutcome::TargetReached);
}

#[test]
fn free_space_scenario_with_too_little_to_prune() {
    let dir = bundle();
    let a = dump(dir.path(), 10, 40);
    let authority = Arc::new(
        MemoryAuthority::new()
            .with_state(10, "completed")
            .with_prune_order([10]),
    );

    let mut janitor = Janitor::new(opts(dir.path(), 10), authority)
        .with_disk_probe(Box::new(FixedCapacityProbe::new(1000, 50)));
    let report = janitor.run().expect("shortfall is not an error");

    assert!(!a.exists());
    assert_eq!(
        report.free_space,
        FreeSpaceOutcome::NothingPrunable { bytes_short: 10 }
    );
}

#[test]
fn second_run_without_changes_deletes_nothing() {
    let dir = bundle();
    upload_aged(dir.path(), "old", Duration::from_secs(7200));
    upload_aged(dir.path(), "new", Duration::from_secs(60));
    for id in 1..=5 {
        dump(dir.path(), id, 16);
    }
    let authority = Arc::new(
        MemoryAuthority::new()
            .with_state(1, "completed")
            .with_state(2, "errored")
            .with_state(4, "completed"),
    );

    let mut janitor = Janitor::new(opts(dir.path(), 10), authority)
        .with_disk_probe(Box::new(FixedCapacityProbe::new(1000, 500)));
    let first = janitor.run().expect("first run");
    assert_eq!(first.files_removed(), 4);

    let second = janitor.run().expect("second run");
    assert_eq!(second.files_removed(), 0);
    assert_eq!(second.free_space, FreeSpaceOutcome::AlreadySatisfied);
}

#[test]
fn failed_run_is_picked_up_by_the_next_one() {
    let dir = bundle();
    dump(dir.path(), 1, 8);
    dump(dir.path(), 2, 8);
    let authority = Arc::new(MemoryAuthority::new().with_state(1, "completed"));
    authority.set_unavailable(true);

    let mut janitor = Janitor::new(opts(dir.path(), 0), authority.clone())
        .with_disk_probe(Box::new(FixedCapacityProbe::new(1000, 1000)));
    let err = janitor.run().expect_err("outage aborts the run");
    assert!(err.is_retryable());
    assert!(db_filename(dir.path(), 2).exists());

    authority.set_unavailable(false);
    let report = janitor.run().expect("recovered run");
    assert_eq!(report.dead_dumps_removed, 1);
    assert!(db_filename(dir.path(), 1).exists());
    assert!(!db_filename(dir.path(), 2).exists());
}

#[test]
fn large_dump_sets_are_checked_in_batches() {
    let dir = bundle();
    for id in 1..=230 {
        dump(dir.path(), id, 1);
    }
    let mut authority = MemoryAuthority::new();
    for id in 1..=230 {
        authority = authority.with_state(id, if id % 2 == 0 { "errored" } else { "completed" });
    }
    let authority = Arc::new(authority);

    let mut janitor = Janitor::new(opts(dir.path(), 0), authority.clone())
        .with_disk_probe(Box::new(FixedCapacityProbe::new(1000, 1000)));
    let report = janitor.run().expect("run");

    let calls = authority.states_calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|batch| batch.len() <= 100));
    let mut seen: Vec<i64> = calls.concat();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen, (1..=230).collect::<Vec<_>>());
    assert_eq!(report.dead_dumps_removed, 115);
}

#[test]
fn activity_events_cover_every_removal() {
    let dir = bundle();
    upload_aged(dir.path(), "old", Duration::from_secs(7200));
    dump(dir.path(), 1, 8);
    dump(dir.path(), 2, 30);
    fs::write(dbs_dir(dir.path()).join("notes.txt"), b"?").expect("junk");
    let authority = Arc::new(
        MemoryAuthority::new()
            .with_state(2, "completed")
            .with_prune_order([2]),
    );
    let (logger, rx) = ActivityLoggerHandle::detached(32);

    let mut janitor = Janitor::new(opts(dir.path(), 10), authority)
        .with_disk_probe(Box::new(FixedCapacityProbe::new(1000, 90)))
        .with_logger(logger);
    let report = janitor.run().expect("run");

    assert_eq!(report.files_removed(), 3);
    assert_eq!(report.unparsable_dump_names, 1);
    assert_eq!(rx.try_iter().count(), 4);
}

/// Minimal authority server: answers `connections` requests, choosing the
/// response by request path.
fn spawn_authority(connections: usize) -> (String, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for _ in 0..connections {
            let (mut stream, _) = listener.accept().expect("accept");
            let request = read_request(&mut stream);
            let (status, body) = if request.starts_with("POST /dumps/states") {
                ("HTTP/1.1 200 OK", r#"{"1":"completed","2":"errored"}"#)
            } else if request.starts_with("POST /prune") {
                ("HTTP/1.1 200 OK", r#"{"id":1}"#)
            } else {
                ("HTTP/1.1 404 Not Found", "")
            };
            let response = format!(
                "{status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("respond");
            requests.push(request);
        }
        requests
    });
    (base, handle)
}

fn read_request(stream: &mut std::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0_u8; 1024];
    loop {
        let n = stream.read(&mut buf).expect("read");
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&raw).to_string();
        if let Some(split) = text.find("\r\n\r\n") {
            let content_length = text[..split]
                .lines()
                .find_map(|line| {
                    line.to_ascii_lowercase()
                        .strip_prefix("content-length:")
                        .and_then(|v| v.trim().parse::<usize>().ok())
                })
                .unwrap_or(0);
            if raw.len() >= split + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).to_string()
}

#[test]
fn http_authority_drives_a_full_run() {
    let dir = bundle();
    dump(dir.path(), 1, 200);
    dump(dir.path(), 2, 10);
    dump(dir.path(), 3, 10);
    let (base, server) = spawn_authority(2);

    let authority = HttpAuthority::new(&base, Duration::from_secs(5)).expect("client");
    let mut janitor = Janitor::new(opts(dir.path(), 10), Arc::new(authority))
        .with_disk_probe(Box::new(FixedCapacityProbe::new(1000, 0)));
    let report = janitor.run().expect("run");
    let requests = server.join().expect("server thread");

    assert_eq!(requests.len(), 2);
    assert!(requests[0].contains(r#""ids":[1,2,3]"#));
    assert_eq!(report.dead_dumps_removed, 2);
    assert_eq!(report.dumps_evicted, 1);
    assert_eq!(report.bytes_evicted, 200);
    assert_eq!(report.free_space, FreeSpaceOutcome::TargetReached);
    assert_eq!(fs::read_dir(dbs_dir(dir.path())).expect("list").count(), 0);
}
