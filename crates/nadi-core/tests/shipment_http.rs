use std::fs;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use nadi_core::{
    DeliveryStatus, DeliveryStore, FileStore, HttpTransport, Reporter, Shipment, ShipperConfig,
    ShutdownSignal, probe, verify,
};
use tempfile::tempdir;
use tiny_http::{Header, Response, Server, StatusCode};

struct NullReporter;

impl Reporter for NullReporter {
    fn info(&mut self, _msg: &str) {}
    fn warn(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

struct Collector {
    base_url: String,
    /// (path, body) of every request received
    seen: Arc<Mutex<Vec<(String, String)>>>,
    handle: thread::JoinHandle<()>,
}

impl Collector {
    fn join(self) -> Vec<(String, String)> {
        self.handle.join().expect("join server");
        let seen = self.seen.lock().expect("lock");
        seen.clone()
    }
}

/// Answer `expected` requests: bodies containing `"reject"` get a 500 with
/// a structured message, everything else a 201.
fn spawn_collector(expected: usize) -> Collector {
    let server = Server::http("127.0.0.1:0").expect("server");
    let base_url = format!("http://{}/api", server.server_addr());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_thread = Arc::clone(&seen);

    let handle = thread::spawn(move || {
        for _ in 0..expected {
            let mut req = server.recv().expect("request");
            let mut body = String::new();
            req.as_reader().read_to_string(&mut body).expect("body");
            let (status, reply) = if body.contains("reject") {
                (500, r#"{"message":"bad token"}"#)
            } else {
                (201, r#"{"message":"stored"}"#)
            };
            seen_thread
                .lock()
                .expect("lock")
                .push((req.url().to_string(), body));

            let resp = Response::from_string(reply)
                .with_status_code(StatusCode(status))
                .with_header(
                    Header::from_bytes("Content-Type", "application/json").expect("header"),
                );
            req.respond(resp).expect("respond");
        }
    });

    Collector {
        base_url,
        seen,
        handle,
    }
}

fn config_for(root: &std::path::Path, base_url: &str) -> ShipperConfig {
    let storage = root.join("spool");
    fs::create_dir_all(&storage).expect("mkdir");
    ShipperConfig {
        endpoint: base_url.to_string(),
        api_key: "key".to_string(),
        token: "tok".to_string(),
        storage,
        tracker_file: root.join("state/tracker.json"),
        max_tries: 1,
        timeout: Duration::from_secs(5),
        check_interval: Duration::from_millis(1),
        ..ShipperConfig::default()
    }
}

#[test]
fn ships_directory_over_http_until_idle() {
    let td = tempdir().expect("tempdir");
    // Pass 1 sends a, b and r. Pass 2 retries r, which then fails for good.
    let server = spawn_collector(4);
    let config = config_for(td.path(), &server.base_url);
    fs::write(config.storage.join("a.json"), r#"{"n":1}"#).expect("write");
    fs::write(config.storage.join("b.json"), r#"{"n":2}"#).expect("write");
    fs::write(config.storage.join("r.json"), r#"{"reject":true}"#).expect("write");
    fs::write(config.storage.join("ignored.log"), "not shipped").expect("write");

    let transport = HttpTransport::from_config(&config).expect("transport");
    let store = FileStore::new(&config.tracker_file);
    let run = Shipment::new(&config, &transport, &store)
        .run_until_idle(&ShutdownSignal::new(), &mut NullReporter)
        .expect("run");

    assert_eq!(run.sent, 2);
    assert_eq!(run.failed, 1);
    assert_eq!(run.passes, 2);

    let seen = server.join();
    let paths: Vec<&str> = seen.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths, vec!["/api/record"; 4]);
    assert_eq!(seen[0].1, r#"{"n":1}"#);
    assert_eq!(seen[1].1, r#"{"n":2}"#);

    let tracker = store.load().expect("tracker");
    assert_eq!(tracker.status("a.json"), DeliveryStatus::Sent);
    assert_eq!(tracker.status("b.json"), DeliveryStatus::Sent);
    assert_eq!(tracker.status("r.json"), DeliveryStatus::Failed);
    assert_eq!(tracker.record("r.json").tries, 2);
    assert!(tracker.get("ignored.log").is_none());

    assert!(!config.storage.join("a.json").exists());
    assert!(config.storage.join("r.json").exists());
    assert!(config.storage.join("ignored.log").exists());
    assert!(!td.path().join("state/tracker.json.tmp").exists());
}

#[test]
fn legacy_tracker_snapshot_is_honoured() {
    let td = tempdir().expect("tempdir");
    // Only c.json should reach the server.
    let server = spawn_collector(1);
    let config = config_for(td.path(), &server.base_url);
    fs::create_dir_all(td.path().join("state")).expect("mkdir");
    fs::write(
        &config.tracker_file,
        r#"{"a.json":{"Status":1,"Tries":0},"b.json":{"Status":2,"Tries":4}}"#,
    )
    .expect("write");
    for name in ["a.json", "b.json", "c.json"] {
        fs::write(config.storage.join(name), "{}").expect("write");
    }

    let transport = HttpTransport::from_config(&config).expect("transport");
    let store = FileStore::new(&config.tracker_file);
    let run = Shipment::new(&config, &transport, &store)
        .run_once(&ShutdownSignal::new(), &mut NullReporter)
        .expect("run");
    assert_eq!(run.sent, 1);

    let seen = server.join();
    assert_eq!(seen.len(), 1);

    let tracker = store.load().expect("tracker");
    assert_eq!(tracker.status("c.json"), DeliveryStatus::Sent);
    assert_eq!(tracker.record("b.json").tries, 4);
}

#[test]
fn probes_report_server_outcome() {
    let server = spawn_collector(2);
    let td = tempdir().expect("tempdir");
    let config = config_for(td.path(), &server.base_url);
    let transport = HttpTransport::from_config(&config).expect("transport");

    let verified = verify(&transport, &mut NullReporter);
    assert!(verified.ok);
    assert_eq!(verified.status, Some(201));
    assert_eq!(verified.message.as_deref(), Some("stored"));

    let tested = probe(&transport, &mut NullReporter);
    assert!(tested.ok);

    let seen = server.join();
    assert_eq!(seen[0], ("/api/verify".to_string(), "{}".to_string()));
    assert_eq!(seen[1], ("/api/test".to_string(), "{}".to_string()));

    // Probes never touch the tracker.
    assert!(!config.tracker_file.exists());
}

#[test]
fn verify_surfaces_structured_rejection() {
    let server = Server::http("127.0.0.1:0").expect("server");
    let base_url = format!("http://{}", server.server_addr());
    let handle = thread::spawn(move || {
        let req = server.recv().expect("request");
        assert_eq!(req.url(), "/verify");
        let resp = Response::from_string(r#"{"message":"bad token"}"#)
            .with_status_code(StatusCode(500));
        req.respond(resp).expect("respond");
    });

    let td = tempdir().expect("tempdir");
    let config = config_for(td.path(), &base_url);
    let transport = HttpTransport::from_config(&config).expect("transport");

    let report = verify(&transport, &mut NullReporter);
    handle.join().expect("join");

    assert!(!report.ok);
    assert_eq!(report.status, Some(500));
    assert_eq!(report.message.as_deref(), Some("bad token"));
}
