//! End-to-End Tests for the OPA CLI
//!
//! These tests verify the complete integration of the OPA components:
//! - Configuration loading from an INI file
//! - Poll cycles from sensor to sink over a scripted transport
//! - The reqwest transport against a localhost server
//! - Scheduler start/stop lifecycle

use async_trait::async_trait;
use opa_core::{
    load_config_from_path, Configuration, HttpRequest, HttpTransport, Poller, RawResponse,
    TransportError,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const LOCAL_URL: &str = "http://192.0.2.1/json";
const REMOTE_URL: &str = "https://api.purpleair.com/v1/sensors/4242";
const SINK_URL: &str = "https://aqicn.org/sensor/upload";

/// Test environment with an isolated configuration file
struct TestEnv {
    _temp_dir: TempDir,
    config_path: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("opa.ini");

        Self {
            _temp_dir: temp_dir,
            config_path,
        }
    }

    fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).expect("Failed to write config");
    }

    fn load(&self) -> Configuration {
        load_config_from_path(&self.config_path).expect("Failed to load config")
    }

    fn poller(&self, transport: Arc<ScriptedTransport>) -> Poller<ScriptedTransport> {
        let config = self.load();
        let settings = config.exporter_settings().expect("Invalid settings");
        Poller::from_config(transport, &config, &settings).expect("Invalid sources")
    }
}

/// Transport answering from a URL table and recording every request
#[derive(Default)]
struct ScriptedTransport {
    routes: Mutex<HashMap<String, Result<RawResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self::default()
    }

    fn respond(self, url: &str, status: u16, body: &str) -> Self {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Ok(RawResponse {
                status,
                text: body.to_string(),
            }),
        );
        self
    }

    fn fail(self, url: &str, error: TransportError) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), Err(error));
        self
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn uploads(&self) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| r.url == SINK_URL)
            .map(|r| serde_json::from_slice(r.body.as_deref().unwrap_or_default()).unwrap())
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        self.routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Err(TransportError::Network(format!("no route to {}", url))))
    }
}

mod config_loading {
    use super::*;

    /// Test: Missing file yields an empty configuration
    #[test]
    fn test_missing_config_file_is_empty() {
        let env = TestEnv::new();
        let config = env.load();
        assert!(config.is_empty());
        assert!(!config.has_local());
        assert!(!config.has_remote());
    }

    /// Test: Both sections are read and exporter defaults apply
    #[test]
    fn test_full_config_file() {
        let env = TestEnv::new();
        env.write_config(
            "[pa_local_api]\nip = 192.0.2.1\n\n[pa_remote_api]\napi_key = KEY-0001\nsensor_index = 4242\n",
        );

        let config = env.load();
        assert_eq!(config.local_ip().unwrap(), "192.0.2.1");
        assert_eq!(config.remote_sensor_index().unwrap(), "4242");

        let settings = config.exporter_settings().unwrap();
        assert_eq!(settings.upload_url, SINK_URL);
        assert_eq!(settings.interval.as_secs(), 120);
        assert!(settings.forward_api_key);
    }

    /// Test: Malformed INI is rejected at load time
    #[test]
    fn test_malformed_config_is_error() {
        let env = TestEnv::new();
        env.write_config("ip = 192.0.2.1\n");
        assert!(load_config_from_path(&env.config_path).is_err());
    }
}

mod poll_cycle {
    use super::*;

    /// Test: No configured source means no network traffic at all
    #[tokio::test]
    async fn test_no_sources_no_fetch() {
        let env = TestEnv::new();
        env.write_config("[unrelated]\nkey = value\n");
        let transport = Arc::new(ScriptedTransport::new());

        let report = env.poller(Arc::clone(&transport)).poll_once().await;

        assert!(report.is_idle());
        assert!(transport.requests().is_empty());
    }

    /// Test: Local reading is posted with the full config dump
    #[tokio::test]
    async fn test_local_reading_is_exported() {
        let env = TestEnv::new();
        env.write_config("[pa_local_api]\nip = 192.0.2.1\n");
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(LOCAL_URL, 200, r#"{"pm2_5":10}"#)
                .respond(SINK_URL, 200, r#"{"status":"ok"}"#),
        );

        let report = env.poller(Arc::clone(&transport)).poll_once().await;
        assert!(report.is_success());

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "GET");
        assert!(requests[0].body.is_none());

        let upload = &requests[1];
        assert_eq!(upload.method, "POST");
        assert_eq!(upload.url, SINK_URL);
        assert_eq!(
            upload.header("content-type"),
            Some("application/json; charset=UTF-8")
        );
        assert_eq!(
            transport.uploads(),
            vec![json!({"opa": {"pm2_5": 10}, "config": {"pa_local_api": {"ip": "192.0.2.1"}}})]
        );
    }

    /// Test: Export 500 is a logged failure, not an error
    #[tokio::test]
    async fn test_export_server_error_does_not_abort() {
        let env = TestEnv::new();
        env.write_config("[pa_local_api]\nip = 192.0.2.1\n");
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(LOCAL_URL, 200, r#"{"pm2_5":10}"#)
                .respond(SINK_URL, 500, "internal error"),
        );

        let report = env.poller(Arc::clone(&transport)).poll_once().await;
        assert_eq!(report.failures(), 1);
        assert_eq!(report.sources.len(), 1);
    }

    /// Test: A server-reported failure is not a success
    #[tokio::test]
    async fn test_export_status_error_is_failure() {
        let env = TestEnv::new();
        env.write_config("[pa_local_api]\nip = 192.0.2.1\n");
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(LOCAL_URL, 200, r#"{"pm2_5":10}"#)
                .respond(SINK_URL, 200, r#"{"status":"error","reason":"bad key"}"#),
        );

        let report = env.poller(Arc::clone(&transport)).poll_once().await;
        assert!(!report.is_success());
        match &report.sources[0].status {
            opa_core::SourceStatus::Exported(opa_core::ExportOutcome::ServerFailure(body)) => {
                assert_eq!(body["reason"], "bad key");
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    /// Test: Remote then local; the key travels in the header and the dump
    #[tokio::test]
    async fn test_remote_and_local_sources() {
        let env = TestEnv::new();
        env.write_config(
            "[pa_local_api]\nip = 192.0.2.1\n[pa_remote_api]\napi_key = KEY-0001\nsensor_index = 4242\n",
        );
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(REMOTE_URL, 200, r#"{"sensor":{"sensor_index":4242}}"#)
                .respond(LOCAL_URL, 200, r#"{"pm2_5":10}"#)
                .respond(SINK_URL, 200, r#"{"status":"ok"}"#),
        );

        let report = env.poller(Arc::clone(&transport)).poll_once().await;
        assert!(report.is_success());

        let requests = transport.requests();
        assert_eq!(requests[0].url, REMOTE_URL);
        assert_eq!(requests[0].header("X-API-Key"), Some("KEY-0001"));
        assert_eq!(requests[2].url, LOCAL_URL);

        let uploads = transport.uploads();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0]["opa"]["sensor"]["sensor_index"], 4242);
        assert_eq!(uploads[0]["config"]["pa_remote_api"]["api_key"], "KEY-0001");
    }

    /// Test: forward_api_key = false keeps the key out of uploads
    #[tokio::test]
    async fn test_api_key_withheld_when_disabled() {
        let env = TestEnv::new();
        env.write_config(
            "[pa_remote_api]\napi_key = KEY-0001\nsensor_index = 4242\n[exporter]\nforward_api_key = no\n",
        );
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(REMOTE_URL, 200, r#"{"sensor":{}}"#)
                .respond(SINK_URL, 200, r#"{"status":"ok"}"#),
        );

        env.poller(Arc::clone(&transport)).poll_once().await;

        let upload = &transport.uploads()[0];
        assert!(upload["config"]["pa_remote_api"].get("api_key").is_none());
        assert!(!upload.to_string().contains("KEY-0001"));
    }

    /// Test: An unreachable sensor skips only that source
    #[tokio::test]
    async fn test_unreachable_sensor_is_skipped() {
        let env = TestEnv::new();
        env.write_config(
            "[pa_local_api]\nip = 192.0.2.1\n[pa_remote_api]\napi_key = KEY-0001\nsensor_index = 4242\n",
        );
        let transport = Arc::new(
            ScriptedTransport::new()
                .fail(REMOTE_URL, TransportError::Timeout)
                .respond(LOCAL_URL, 200, r#"{"pm2_5":10}"#)
                .respond(SINK_URL, 200, r#"{"status":"ok"}"#),
        );

        let report = env.poller(Arc::clone(&transport)).poll_once().await;
        assert_eq!(report.failures(), 1);
        assert_eq!(transport.uploads().len(), 1);
    }
}

mod scheduler_lifecycle {
    use super::*;
    use opa_core::{PollScheduler, SchedulerError};
    use std::time::Duration;

    /// Test: Scheduler runs cycles until stopped
    #[tokio::test]
    async fn test_scheduler_start_stop() {
        let env = TestEnv::new();
        env.write_config("[pa_local_api]\nip = 192.0.2.1\n");
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(LOCAL_URL, 200, r#"{"pm2_5":10}"#)
                .respond(SINK_URL, 200, r#"{"status":"ok"}"#),
        );
        let poller = Arc::new(env.poller(Arc::clone(&transport)));
        let scheduler = PollScheduler::new(poller, Duration::from_millis(100));

        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        tokio::time::sleep(Duration::from_millis(250)).await;
        scheduler.stop().await.unwrap();

        assert!(!scheduler.is_running());
        let cycles = scheduler.cycles_completed();
        assert!(cycles >= 2);
        assert_eq!(transport.uploads().len() as u64, cycles);

        assert!(matches!(
            scheduler.stop().await,
            Err(SchedulerError::NotRunning)
        ));
    }
}

mod live_transport {
    use super::*;
    use opa_adapters::ReqwestTransport;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `/json` and `/sensor/upload`, collecting upload bodies
    async fn spawn_server(upload_answer: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let uploads = Arc::new(Mutex::new(Vec::new()));
        let collected = Arc::clone(&uploads);

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let collected = Arc::clone(&collected);
                tokio::spawn(async move {
                    let raw = read_request(&mut socket).await;
                    let body = if raw.starts_with("GET /json") {
                        r#"{"pm2_5":10}"#.to_string()
                    } else {
                        let payload = raw.split("\r\n\r\n").nth(1).unwrap_or_default();
                        collected.lock().unwrap().push(payload.to_string());
                        upload_answer.to_string()
                    };
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (addr, uploads)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Test: Full cycle over real HTTP against a local sensor and sink
    #[tokio::test]
    async fn test_cycle_over_reqwest() {
        let (addr, uploads) = spawn_server(r#"{"status":"ok"}"#).await;
        let env = TestEnv::new();
        env.write_config(&format!(
            "[pa_local_api]\nip = {addr}\n[exporter]\nupload_url = http://{addr}/sensor/upload\n"
        ));

        let config = env.load();
        let settings = config.exporter_settings().unwrap();
        let transport = Arc::new(ReqwestTransport::new().unwrap());
        let poller = Poller::from_config(transport, &config, &settings).unwrap();

        let report = poller.poll_once().await;
        assert!(report.is_success(), "{:?}", report);

        let uploads = uploads.lock().unwrap().clone();
        assert_eq!(uploads.len(), 1);
        let body: Value = serde_json::from_str(&uploads[0]).unwrap();
        assert_eq!(body["opa"], json!({"pm2_5": 10}));
        assert_eq!(body["config"]["pa_local_api"]["ip"], addr);
        assert_eq!(body["config"]["exporter"]["upload_url"], format!("http://{addr}/sensor/upload"));
    }

    /// Test: Server-reported failure over real HTTP
    #[tokio::test]
    async fn test_server_failure_over_reqwest() {
        let (addr, _uploads) = spawn_server(r#"{"status":"error","reason":"bad key"}"#).await;
        let env = TestEnv::new();
        env.write_config(&format!(
            "[pa_local_api]\nip = {addr}\n[exporter]\nupload_url = http://{addr}/sensor/upload\n"
        ));

        let config = env.load();
        let settings = config.exporter_settings().unwrap();
        let transport = Arc::new(ReqwestTransport::new().unwrap());
        let poller = Poller::from_config(transport, &config, &settings).unwrap();

        let report = poller.poll_once().await;
        assert_eq!(report.failures(), 1);
    }
}
