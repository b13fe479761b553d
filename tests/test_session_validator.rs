//! Partner validation over HTTP against a canned local server.

use std::time::Duration;

use doc_lens::error::{ErrorSeverity, HasSeverity, LensError};
use doc_lens::identity::{HttpSessionValidator, SessionValidator};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one request with `status` and `body`, handing back the request head.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/validate", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
        String::from_utf8_lossy(&request).into_owned()
    });
    (url, handle)
}

fn validator(url: &str) -> HttpSessionValidator {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    HttpSessionValidator::with_client(client, url, Duration::from_secs(5))
}

#[tokio::test]
async fn test_success_returns_the_session_key() {
    let (url, server) = serve_once("200 OK", r#"{"session":"key-123"}"#).await;

    let session = validator(&url).validate("client-1").await.unwrap();
    assert_eq!(session, "key-123");

    let request = server.await.unwrap();
    let head = request.to_ascii_lowercase();
    assert!(head.starts_with("post /validate "), "unexpected request line: {}", request);
    assert!(head.contains("\r\nclient-id: client-1\r\n"), "missing CLIENT-ID header: {}", request);
}

#[tokio::test]
async fn test_rejected_client_id_is_an_auth_error() {
    let (url, server) = serve_once("401 Unauthorized", r#"{"error":"unknown client"}"#).await;

    let err = validator(&url).validate("someone-else").await.unwrap_err();
    assert!(matches!(err, LensError::Auth { .. }), "got {:?}", err);
    assert_eq!(err.context().metadata.get("status").map(String::as_str), Some("401"));
    assert_eq!(err.severity(), ErrorSeverity::Fatal);
    server.await.unwrap();
}

#[tokio::test]
async fn test_malformed_body_is_an_error() {
    let (url, server) = serve_once("200 OK", r#"{"token":"key-123"}"#).await;

    let err = validator(&url).validate("client-1").await.unwrap_err();
    assert!(!matches!(err, LensError::Auth { .. }));
    server.await.unwrap();
}
