//! End-to-end tests: a real gate listener in front of a mock Emby backend.

mod common;

use axum_server::Handle;
use reqwest::StatusCode;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use emby_image_gate::domain::models::{Config, HumanDuration};
use emby_image_gate::GateServer;

const PRIMARY: &str = "/emby/Items/12345/Images/Primary";

fn gate_config(backend_uri: &str) -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.backend.base_url = backend_uri.to_string();
    config.backend.api_key = "test-api-key".to_string();
    config.cache.ttl = HumanDuration::from_secs(60);
    config
}

/// Start a gate on an ephemeral port and return its address
async fn start_gate(config: &Config) -> (SocketAddr, Handle) {
    let handle = Handle::new();
    let server = GateServer::from_config(config).unwrap();
    tokio::spawn(server.run(handle.clone()));
    let addr = handle.listening().await.expect("gate failed to bind");
    (addr, handle)
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn closed_port_uri() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    format!("http://{}", listener.local_addr().unwrap())
}

/// Send `GET <target>` exactly as written, bypassing client-side URL cleanup
async fn raw_get_status(addr: SocketAddr, target: &str) -> u16 {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: gate\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);
    response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or_else(|| panic!("no status line in {response:?}"))
}

/// Read up to and including the blank line ending an HTTP head
async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await.unwrap() == 0 {
            break;
        }
        head.push(byte[0]);
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// A backend that accepts one websocket-style upgrade and echoes every byte
async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let head = read_head(&mut socket).await.to_ascii_lowercase();
        if !head.contains("upgrade: websocket") {
            socket
                .write_all(b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\n\r\n")
                .await
                .unwrap();
            return;
        }

        socket
            .write_all(b"HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n")
            .await
            .unwrap();

        let mut buf = [0u8; 1024];
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if socket.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    addr
}

async fn mount_sessions(backend: &MockServer, sessions: serde_json::Value, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/emby/Sessions"))
        .and(header("X-Emby-Token", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sessions))
        .expect(expected_calls)
        .mount(backend)
        .await;
}

#[tokio::test]
async fn test_ping_with_backend_down() {
    common::setup_test_logging();
    let (addr, _handle) = start_gate(&gate_config(&closed_port_uri())).await;

    let response = http_client()
        .get(format!("http://{addr}/ping"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_allowed_client_gets_image_and_is_cached() {
    let backend = MockServer::start().await;
    mount_sessions(
        &backend,
        serde_json::json!([{ "Id": "s1", "RemoteEndPoint": "127.0.0.1", "UserId": "alice" }]),
        1,
    )
    .await;

    let image = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    Mock::given(method("GET"))
        .and(path(PRIMARY))
        .and(query_param("maxWidth", "300"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(image.clone(), "image/png"),
        )
        .expect(2)
        .mount(&backend)
        .await;

    let (addr, _handle) = start_gate(&gate_config(&backend.uri())).await;
    let client = http_client();

    for _ in 0..2 {
        let response = client
            .get(format!("http://{addr}{PRIMARY}?maxWidth=300"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/png");
        assert_eq!(response.bytes().await.unwrap().as_ref(), image.as_slice());
    }
}

#[tokio::test]
async fn test_unknown_client_denied_without_forwarding() {
    let backend = MockServer::start().await;
    mount_sessions(
        &backend,
        serde_json::json!([{ "Id": "s1", "RemoteEndPoint": "10.9.8.7", "UserId": "alice" }]),
        2,
    )
    .await;

    Mock::given(method("GET"))
        .and(path(PRIMARY))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let (addr, _handle) = start_gate(&gate_config(&backend.uri())).await;
    let client = http_client();

    // No negative caching: both attempts query the backend
    for _ in 0..2 {
        let response = client
            .get(format!("http://{addr}{PRIMARY}"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.bytes().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_session_query_failure_fails_closed() {
    let backend = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/emby/Sessions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&backend)
        .await;

    Mock::given(method("GET"))
        .and(path(PRIMARY))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let (addr, _handle) = start_gate(&gate_config(&backend.uri())).await;

    let response = http_client()
        .get(format!("http://{addr}{PRIMARY}"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ungated_request_forwarded_unchanged() {
    let backend = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emby/Sessions/Playing/Progress"))
        .and(header("x-emby-authorization", "MediaBrowser Token=\"user-token\""))
        .and(body_string("{\"PositionTicks\":1200}"))
        .respond_with(
            ResponseTemplate::new(204).insert_header("x-backend", "emby"),
        )
        .expect(1)
        .mount(&backend)
        .await;

    let (addr, _handle) = start_gate(&gate_config(&backend.uri())).await;

    let response = http_client()
        .post(format!("http://{addr}/emby/Sessions/Playing/Progress"))
        .header("x-emby-authorization", "MediaBrowser Token=\"user-token\"")
        .header("proxy-authorization", "Basic c2VjcmV0")
        .body("{\"PositionTicks\":1200}")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["x-backend"], "emby");

    let received = backend.received_requests().await.unwrap();
    let forwarded = received
        .iter()
        .find(|r| r.url.path() == "/emby/Sessions/Playing/Progress")
        .unwrap();

    let backend_host = backend.address().to_string();
    assert_eq!(forwarded.headers.get("host").unwrap(), backend_host.as_str());
    assert!(forwarded.headers.get("proxy-authorization").is_none());
    assert!(forwarded.headers.get("x-forwarded-for").is_none());
}

#[tokio::test]
async fn test_ping_other_methods_are_forwarded() {
    let backend = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(418))
        .expect(1)
        .mount(&backend)
        .await;

    let (addr, _handle) = start_gate(&gate_config(&backend.uri())).await;

    let response = http_client()
        .post(format!("http://{addr}/ping"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
}

#[tokio::test]
async fn test_redirects_passed_through() {
    let backend = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/web"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/web/index.html"),
        )
        .expect(1)
        .mount(&backend)
        .await;

    let (addr, _handle) = start_gate(&gate_config(&backend.uri())).await;

    let response = http_client()
        .get(format!("http://{addr}/web"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/web/index.html");
}

#[tokio::test]
async fn test_forwarded_headers_when_enabled() {
    let backend = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/emby/System/Info/Public"))
        .and(header("x-forwarded-for", "127.0.0.1"))
        .and(header("x-forwarded-proto", "http"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&backend)
        .await;

    let mut config = gate_config(&backend.uri());
    config.server.add_forwarded_headers = true;
    let (addr, _handle) = start_gate(&config).await;

    let response = http_client()
        .get(format!("http://{addr}/emby/System/Info/Public"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_trusted_forwarded_for_is_used_for_gating() {
    let backend = MockServer::start().await;
    mount_sessions(
        &backend,
        serde_json::json!([{ "Id": "s1", "RemoteEndPoint": "203.0.113.7:40122", "UserId": "alice" }]),
        1,
    )
    .await;

    Mock::given(method("GET"))
        .and(path(PRIMARY))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&backend)
        .await;

    let mut config = gate_config(&backend.uri());
    config.server.trust_forwarded_headers = true;
    let (addr, _handle) = start_gate(&config).await;

    let response = http_client()
        .get(format!("http://{addr}{PRIMARY}"))
        .header("x-forwarded-for", "203.0.113.7")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_backend_unreachable_while_forwarding() {
    let (addr, _handle) = start_gate(&gate_config(&closed_port_uri())).await;

    let response = http_client()
        .get(format!("http://{addr}/web/index.html"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_graceful_shutdown_stops_listener() {
    let (addr, handle) = start_gate(&gate_config(&closed_port_uri())).await;

    handle.graceful_shutdown(Some(std::time::Duration::from_secs(1)));
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    assert!(http_client()
        .get(format!("http://{addr}/ping"))
        .send()
        .await
        .is_err());
}

#[tokio::test]
async fn test_dot_segment_paths_cannot_reach_primary_images() {
    let backend = MockServer::start().await;
    mount_sessions(&backend, serde_json::json!([]), 0).await;

    // Nothing at all may reach the backend
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"secret".to_vec(), "image/png"))
        .expect(0)
        .mount(&backend)
        .await;

    let (addr, _handle) = start_gate(&gate_config(&backend.uri())).await;

    for target in [
        "/emby/Items/42/x/../Images/Primary",
        "/emby/Items/42/Images/./Primary",
        "/emby/Items/42/Images/%2e/Primary",
        "/emby/x/%2E%2E/Items/42/Images/Primary",
        "/emby/x/.%2E/Items/42/Images/Primary?maxWidth=300",
    ] {
        assert_eq!(raw_get_status(addr, target).await, 400, "{target}");
    }
}

#[tokio::test]
async fn test_encoded_primary_path_is_gated() {
    let backend = MockServer::start().await;
    mount_sessions(&backend, serde_json::json!([]), 2).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let (addr, _handle) = start_gate(&gate_config(&backend.uri())).await;

    for target in ["/emby/Items/42/Images/%50rimary", "//emby//Items/42/Images/Primary"] {
        assert_eq!(raw_get_status(addr, target).await, 401, "{target}");
    }
}

#[tokio::test]
async fn test_websocket_upgrade_is_spliced_to_backend() {
    let backend = start_echo_backend().await;
    let (addr, _handle) = start_gate(&gate_config(&format!("http://{backend}"))).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"GET /embywebsocket?deviceId=tv HTTP/1.1\r\n\
              Host: gate\r\n\
              Connection: Upgrade\r\n\
              Upgrade: websocket\r\n\
              Sec-WebSocket-Version: 13\r\n\
              Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        )
        .await
        .unwrap();

    let head = tokio::time::timeout(Duration::from_secs(5), read_head(&mut stream))
        .await
        .expect("no upgrade response");
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected response: {head}");
    assert!(head.to_ascii_lowercase().contains("upgrade: websocket"));

    for frame in [&b"ping"[..], &b"a longer second frame"[..]] {
        stream.write_all(frame).await.unwrap();
        let mut echoed = vec![0u8; frame.len()];
        tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut echoed))
            .await
            .expect("echo timed out")
            .unwrap();
        assert_eq!(echoed, frame);
    }
}

#[tokio::test]
async fn test_client_accept_header_forwarded_verbatim() {
    let backend = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/emby/Items/42/Images/Backdrop"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&backend)
        .await;

    let (addr, _handle) = start_gate(&gate_config(&backend.uri())).await;
    let client = http_client();
    let url = format!("http://{addr}/emby/Items/42/Images/Backdrop");

    client
        .get(&url)
        .header("accept", "image/webp,image/*;q=0.8")
        .send()
        .await
        .unwrap();

    let mut raw = TcpStream::connect(addr).await.unwrap();
    raw.write_all(
        b"GET /emby/Items/42/Images/Backdrop HTTP/1.1\r\nHost: gate\r\nConnection: close\r\n\r\n",
    )
    .await
    .unwrap();
    let mut sink = Vec::new();
    raw.read_to_end(&mut sink).await.unwrap();

    let received = backend.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);

    let accepts: Vec<&str> = received[0]
        .headers
        .get_all("accept")
        .iter()
        .map(|value| value.to_str().unwrap())
        .collect();
    assert_eq!(accepts, vec!["image/webp,image/*;q=0.8"]);

    // Without a client Accept the HTTP client's wildcard default is sent
    assert_eq!(received[1].headers.get("accept").unwrap(), "*/*");
}
