use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use demprep::imagery::{Credentials, ProcessApiClient};
use demprep::{BoundingBox, Crs, Dimensions, Error, ErrorKind, ImageryClient, ImageryConfig, ImageryRequest, TimeRange};

#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

struct Reply {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
    delay: Duration,
}

impl Reply {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self { status, content_type: "application/json", body: body.to_string().into_bytes(), delay: Duration::ZERO }
    }

    fn bytes(status: u16, content_type: &'static str, body: &[u8]) -> Self {
        Self { status, content_type, body: body.to_vec(), delay: Duration::ZERO }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}

/// Minimal HTTP/1.1 responder; every connection is closed after one reply
fn serve<F>(respond: F) -> (String, Arc<Mutex<Vec<Recorded>>>)
where
    F: Fn(&str) -> Reply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let log = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&log);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
                continue;
            }
            let path = request_line.split_whitespace().nth(1).unwrap_or("").to_string();

            let mut headers = HashMap::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
                }
            }
            let length = headers.get("content-length").and_then(|v| v.parse().ok()).unwrap_or(0);
            let mut body = vec![0u8; length];
            reader.read_exact(&mut body).unwrap();

            let reply = respond(&path);
            seen.lock().unwrap().push(Recorded { path, headers, body });

            thread::sleep(reply.delay);
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                reply.status,
                reason(reply.status),
                reply.content_type,
                reply.body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&reply.body);
            let _ = stream.flush();
        }
    });

    (base, log)
}

fn config(base: &str) -> ImageryConfig {
    ImageryConfig {
        token_url: format!("{}/token", base),
        process_url: format!("{}/process", base),
        ..ImageryConfig::default()
    }
}

fn request() -> ImageryRequest {
    ImageryRequest {
        bbox: BoundingBox::new(126.0, 33.0, 130.0, 38.5),
        crs: Crs::WGS84,
        size: Dimensions::new(2500, 1582),
        time_range: TimeRange::new(
            NaiveDate::from_ymd_opt(2023, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 9, 15).unwrap(),
        )
        .unwrap(),
        max_cloud: 5.0,
    }
}

fn token_ok() -> Reply {
    Reply::json(200, serde_json::json!({"access_token": "token-123", "token_type": "Bearer", "expires_in": 600}))
}

fn creds() -> Option<Credentials> {
    Some(Credentials::new("client", "secret"))
}

#[test]
fn test_rejected_credentials_skip_processing() {
    let (base, log) = serve(|path| match path {
        "/token" => Reply::json(401, serde_json::json!({"error": "invalid_client"})),
        _ => Reply::bytes(200, "image/tiff", b"unexpected"),
    });

    let client = ProcessApiClient::with_credentials(&config(&base), creds()).unwrap();
    let mut sink = Vec::new();
    let err = client.fetch_rgb(&request(), &mut sink).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(sink.is_empty());
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].path, "/token");
    let form = String::from_utf8(log[0].body.clone()).unwrap();
    assert!(form.contains("grant_type=client_credentials"));
    assert!(form.contains("client_id=client"));
}

#[test]
fn test_missing_credentials_issue_no_request() {
    let (base, log) = serve(|_| token_ok());
    let client = ProcessApiClient::with_credentials(&config(&base), None).unwrap();
    let mut sink = Vec::new();
    let err = client.fetch_rgb(&request(), &mut sink).unwrap_err();

    assert!(matches!(err, Error::Authentication(_)));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_json_error_body_is_decoded() {
    let (base, log) = serve(|path| match path {
        "/token" => token_ok(),
        _ => Reply::json(
            400,
            serde_json::json!({
                "error": {"status": 400, "reason": "Bad Request", "message": "Requested image is too large"}
            }),
        ),
    });

    let client = ProcessApiClient::with_credentials(&config(&base), creds()).unwrap();
    let mut sink = Vec::new();
    let err = client.fetch_rgb(&request(), &mut sink).unwrap_err();

    let remote = match err {
        Error::RemoteProcessing(remote) => remote,
        other => panic!("unexpected error: {}", other),
    };
    assert_eq!(remote.status, 400);
    assert_eq!(remote.message(), Some("Requested image is too large"));
    assert_eq!(remote.bbox, BoundingBox::new(126.0, 33.0, 130.0, 38.5));
    assert_eq!((remote.width, remote.height), (2500, 1582));
    assert!(remote.raw_body.is_none());

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].path, "/process");
    assert_eq!(log[1].headers.get("authorization").map(String::as_str), Some("Bearer token-123"));
    let payload: serde_json::Value = serde_json::from_slice(&log[1].body).unwrap();
    assert_eq!(payload["output"]["width"], 2500);
    assert_eq!(payload["input"]["data"][0]["dataFilter"]["maxCloudCoverage"], 5.0);
}

#[test]
fn test_plain_error_body_is_kept_raw() {
    let (base, _log) = serve(|path| match path {
        "/token" => token_ok(),
        _ => Reply::bytes(502, "text/html", b"<html>upstream unavailable</html>"),
    });

    let client = ProcessApiClient::with_credentials(&config(&base), creds()).unwrap();
    let mut sink = Vec::new();
    let err = client.fetch_rgb(&request(), &mut sink).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RemoteProcessing);
    match err {
        Error::RemoteProcessing(remote) => {
            assert_eq!(remote.status, 502);
            assert!(remote.body.is_none());
            assert_eq!(remote.raw_body.as_deref(), Some("<html>upstream unavailable</html>"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_success_streams_body() {
    let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    let served = payload.clone();
    let (base, _log) = serve(move |path| match path {
        "/token" => token_ok(),
        _ => Reply::bytes(200, "image/tiff", &served),
    });

    let client = ProcessApiClient::with_credentials(&config(&base), creds()).unwrap();
    let mut sink = Vec::new();
    let written = client.fetch_rgb(&request(), &mut sink).unwrap();

    assert_eq!(written, payload.len() as u64);
    assert_eq!(sink, payload);
}

#[test]
fn test_slow_token_endpoint_times_out() {
    let (base, _log) = serve(|_| Reply { delay: Duration::from_secs(3), ..token_ok() });

    let config = ImageryConfig { auth_timeout_secs: 1, ..config(&base) };
    let client = ProcessApiClient::with_credentials(&config, creds()).unwrap();
    let mut sink = Vec::new();
    let err = client.fetch_rgb(&request(), &mut sink).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
}
