use super::*;
use serial_test::serial;
use std::net::TcpListener;
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(port: u16, manage: bool, binary: PathBuf) -> Config {
    let mut config = Config::default();
    config.ollama.host = "127.0.0.1".to_string();
    config.ollama.port = port;
    config.server = ServerConfig {
        manage,
        binary,
        ready_timeout_secs: 1,
    };
    config
}

/// A port nothing is listening on
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("should bind ephemeral port");
    listener
        .local_addr()
        .expect("should have local address")
        .port()
}

async fn answering_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"models":[]}"#))
        .mount(&server)
        .await;
    server
}

#[cfg(unix)]
fn fake_ollama(dir: &std::path::Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("ollama");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("should write script");
    let mut permissions = std::fs::metadata(&path)
        .expect("should stat script")
        .permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).expect("should chmod script");
    path
}

#[tokio::test(flavor = "multi_thread")]
async fn start_skips_spawn_when_server_answers() {
    let server = answering_server().await;
    let config = config_for(
        server.address().port(),
        true,
        PathBuf::from("/nonexistent/ollama"),
    );
    let mut runtime = ModelRuntime::new(&config).expect("should create runtime");

    assert_eq!(
        runtime.start().await.expect("start should succeed"),
        RuntimeStatus::AlreadyRunning
    );
    assert!(!runtime.has_child());
    assert_eq!(
        runtime.ensure_ready().await.expect("should be ready"),
        RuntimeStatus::AlreadyRunning
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unmanaged_runtime_never_spawns() {
    let config = config_for(closed_port(), false, PathBuf::from("/nonexistent/ollama"));
    let mut runtime = ModelRuntime::new(&config).expect("should create runtime");

    assert_eq!(
        runtime.start().await.expect("start should succeed"),
        RuntimeStatus::Unmanaged
    );
    assert!(!runtime.has_child());
    assert!(matches!(
        runtime.ensure_ready().await,
        Err(RagError::Runtime(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn missing_binary_is_a_runtime_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(closed_port(), true, temp_dir.path().join("ollama"));
    let mut runtime = ModelRuntime::new(&config).expect("should create runtime");

    match runtime.start().await {
        Err(RagError::Runtime(message)) => assert!(message.contains("Failed to start")),
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn wait_until_ready_returns_once_server_answers() {
    let server = answering_server().await;
    let config = config_for(server.address().port(), true, PathBuf::from("ollama"));
    let mut runtime = ModelRuntime::new(&config).expect("should create runtime");

    runtime
        .wait_until_ready(Duration::from_secs(2))
        .await
        .expect("server should be ready");
}

#[tokio::test(flavor = "multi_thread")]
async fn wait_until_ready_times_out() {
    let config = config_for(closed_port(), true, PathBuf::from("ollama"));
    let mut runtime = ModelRuntime::new(&config).expect("should create runtime");

    let started = std::time::Instant::now();
    let result = runtime.wait_until_ready(Duration::from_millis(300)).await;

    assert!(matches!(result, Err(RagError::Runtime(_))));
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn spawned_child_that_exits_is_reported() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let binary = fake_ollama(temp_dir.path(), "exit 1");
    let config = config_for(closed_port(), true, binary);
    let mut runtime = ModelRuntime::new(&config).expect("should create runtime");

    assert_eq!(
        runtime.start().await.expect("spawn should succeed"),
        RuntimeStatus::Spawned
    );

    match runtime.wait_until_ready(Duration::from_secs(5)).await {
        Err(RagError::Runtime(message)) => assert!(message.contains("exited")),
        other => panic!("expected runtime error, got {other:?}"),
    }
    assert!(!runtime.has_child());
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn spawned_child_receives_host_and_is_stopped() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let marker = temp_dir.path().join("env.txt");
    let binary = fake_ollama(
        temp_dir.path(),
        &format!(
            "printf '%s %s' \"$1\" \"$OLLAMA_HOST\" > '{}'\nexec sleep 30",
            marker.display()
        ),
    );
    let port = closed_port();
    let config = config_for(port, true, binary);
    let mut runtime = ModelRuntime::new(&config).expect("should create runtime");

    assert_eq!(
        runtime.start().await.expect("spawn should succeed"),
        RuntimeStatus::Spawned
    );
    assert!(runtime.has_child());

    // The fake never answers, so readiness times out while the child is still alive
    assert!(
        runtime
            .wait_until_ready(Duration::from_millis(500))
            .await
            .is_err()
    );
    assert!(runtime.has_child());

    let written = std::fs::read_to_string(&marker).expect("script should have run");
    assert_eq!(written, format!("serve 127.0.0.1:{port}"));

    runtime.shutdown().await.expect("shutdown should succeed");
    assert!(!runtime.has_child());
}
