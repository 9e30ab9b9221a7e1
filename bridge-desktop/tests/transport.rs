//! End-to-end exchanges against a local axum server.
//!
//! The server runs on its own runtime in a plain thread so the transport's
//! engine and the server never share a runtime.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::time::Duration;

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    response::AppendHeaders,
    routing::{get, post},
    Router,
};
use bridge_desktop::{ReqwestTransport, TransportConfig};
use bridge_traits::{
    callback::from_fn, BridgeError, HttpContent, HttpMethod, HttpTransport, Outcome,
    RequestHandle, ResponseEnvelope,
};

const WAIT: Duration = Duration::from_secs(10);

fn app() -> Router {
    Router::new()
        .route(
            "/users",
            get(|| async {
                (
                    [("content-type", "application/json"), ("x-request-id", "abc")],
                    r#"{"users":[{"id":1}]}"#,
                )
            }),
        )
        .route("/echo", post(echo))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        )
        .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "nope") }))
        .route(
            "/cookies",
            get(|| async {
                AppendHeaders([
                    ("set-cookie", "session=a1"),
                    ("x-between", "1"),
                    ("set-cookie", "theme=dark"),
                ])
            }),
        )
        .route(
            "/unregistered",
            get(|| async { (StatusCode::from_u16(499).unwrap(), "client closed") }),
        )
}

async fn echo(headers: HeaderMap, body: Bytes) -> (HeaderMap, Bytes) {
    let mut out = HeaderMap::new();
    if let Some(length) = headers.get("content-length") {
        out.insert("x-received-length", length.clone());
    }
    if let Some(encoding) = headers.get("transfer-encoding") {
        out.insert("x-received-transfer-encoding", encoding.clone());
    }
    if let Some(content_type) = headers.get("content-type") {
        out.insert("x-received-content-type", content_type.clone());
    }
    (out, body)
}

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            axum::serve(listener, app()).await
        })
        .unwrap();
    });

    addr
}

/// Runs the exchange and reads the body inside the completion callback.
fn exchange(
    transport: &ReqwestTransport,
    method: HttpMethod,
    url: &str,
    content: Option<HttpContent>,
    handle: &RequestHandle,
) -> Outcome<(ResponseEnvelope, Vec<u8>)> {
    let mut request = transport.build_request(&method, url).unwrap();
    if let Some(content) = content {
        request.set_content(content);
    }
    let deferred = request.execute().unwrap();

    let (tx, rx) = mpsc::channel();
    deferred.with_callback(
        from_fn(move |outcome: Outcome<ResponseEnvelope>| {
            let outcome = match outcome {
                Outcome::Completed(mut envelope) => {
                    let mut body = Vec::new();
                    if let Some(mut content) = envelope.take_content() {
                        content.read_to_end(&mut body).unwrap();
                    }
                    Outcome::Completed((envelope, body))
                }
                Outcome::Failed(e) => Outcome::Failed(e),
                Outcome::Cancelled => Outcome::Cancelled,
            };
            tx.send(outcome).unwrap();
        }),
        handle.token(),
    );

    rx.recv_timeout(WAIT).unwrap()
}

#[test]
fn test_get_delivers_status_headers_and_body() {
    let addr = start_server();
    let transport = ReqwestTransport::new();

    let outcome = exchange(
        &transport,
        HttpMethod::Get,
        &format!("http://{addr}/users"),
        None,
        &RequestHandle::new(),
    );

    match outcome {
        Outcome::Completed((envelope, body)) => {
            assert_eq!(envelope.status(), 200);
            assert_eq!(envelope.reason_phrase(), Some("OK"));
            assert_eq!(envelope.content_type(), Some("application/json"));
            assert_eq!(envelope.headers().get("X-Request-Id"), Some("abc"));
            assert_eq!(body, br#"{"users":[{"id":1}]}"#);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    transport.shutdown().unwrap();
}

#[test]
fn test_error_status_is_completed_not_failed() {
    let addr = start_server();
    let transport = ReqwestTransport::new();

    let outcome = exchange(
        &transport,
        HttpMethod::Get,
        &format!("http://{addr}/missing"),
        None,
        &RequestHandle::new(),
    );

    match outcome {
        Outcome::Completed((envelope, body)) => {
            assert_eq!(envelope.status(), 404);
            assert!(!envelope.is_success());
            assert_eq!(body, b"nope");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_fixed_length_body_sends_content_length() {
    let addr = start_server();
    let transport = ReqwestTransport::new();

    let outcome = exchange(
        &transport,
        HttpMethod::Post,
        &format!("http://{addr}/echo"),
        Some(HttpContent::bytes(&b"hello world"[..], "text/plain")),
        &RequestHandle::new(),
    );

    match outcome {
        Outcome::Completed((envelope, body)) => {
            assert_eq!(envelope.headers().get("x-received-length"), Some("11"));
            assert_eq!(envelope.headers().get("x-received-content-type"), Some("text/plain"));
            assert_eq!(body, b"hello world");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_unknown_length_body_is_chunked() {
    let addr = start_server();
    let transport = ReqwestTransport::new();

    let outcome = exchange(
        &transport,
        HttpMethod::Post,
        &format!("http://{addr}/echo"),
        Some(HttpContent::json(serde_json::json!({ "name": "a" }))),
        &RequestHandle::new(),
    );

    match outcome {
        Outcome::Completed((envelope, body)) => {
            assert_eq!(
                envelope.headers().get("x-received-transfer-encoding"),
                Some("chunked")
            );
            assert!(envelope.headers().get("x-received-length").is_none());
            assert_eq!(body, br#"{"name":"a"}"#);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_cancel_reports_cancelled() {
    let addr = start_server();
    let transport = ReqwestTransport::new();
    let handle = RequestHandle::new();

    let canceller = handle.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        canceller.cancel();
    });

    let outcome = exchange(
        &transport,
        HttpMethod::Get,
        &format!("http://{addr}/slow"),
        None,
        &handle,
    );
    assert!(matches!(outcome, Outcome::Cancelled));
}

#[test]
fn test_connection_refused_reports_failed() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let transport = ReqwestTransport::new();

    let outcome = exchange(
        &transport,
        HttpMethod::Get,
        &format!("http://{addr}/users"),
        None,
        &RequestHandle::new(),
    );

    match outcome {
        Outcome::Failed(BridgeError::Connect(_)) | Outcome::Failed(BridgeError::OperationFailed(_)) => {}
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_request_timeout_reports_timeout() {
    let addr = start_server();
    let config = TransportConfig::builder()
        .request_timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let transport = ReqwestTransport::with_config(config).unwrap();

    let outcome = exchange(
        &transport,
        HttpMethod::Get,
        &format!("http://{addr}/slow"),
        None,
        &RequestHandle::new(),
    );
    assert!(matches!(outcome, Outcome::Failed(BridgeError::Timeout)));
}

#[tokio::test]
async fn test_shutdown_inside_async_context() {
    let transport = ReqwestTransport::new();
    transport
        .build_request(&HttpMethod::Get, "http://localhost/")
        .unwrap();
    assert!(transport.is_running());

    transport.shutdown().unwrap();
    assert!(!transport.is_running());
}

#[test]
fn test_duplicate_headers_keep_every_value_in_order() {
    let addr = start_server();
    let transport = ReqwestTransport::new();

    let outcome = exchange(
        &transport,
        HttpMethod::Get,
        &format!("http://{addr}/cookies"),
        None,
        &RequestHandle::new(),
    );

    match outcome {
        Outcome::Completed((envelope, _)) => {
            let cookies: Vec<&str> = envelope.headers().get_all("Set-Cookie").collect();
            assert_eq!(cookies, vec!["session=a1", "theme=dark"]);
            assert_eq!(envelope.headers().get("x-between"), Some("1"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_reason_phrase_is_canonical() {
    let addr = start_server();
    let transport = ReqwestTransport::new();

    let missing = exchange(
        &transport,
        HttpMethod::Get,
        &format!("http://{addr}/missing"),
        None,
        &RequestHandle::new(),
    );
    match missing {
        Outcome::Completed((envelope, _)) => {
            assert_eq!(envelope.reason_phrase(), Some("Not Found"))
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let unregistered = exchange(
        &transport,
        HttpMethod::Get,
        &format!("http://{addr}/unregistered"),
        None,
        &RequestHandle::new(),
    );
    match unregistered {
        Outcome::Completed((envelope, _)) => {
            assert_eq!(envelope.status(), 499);
            assert_eq!(envelope.reason_phrase(), None);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}
