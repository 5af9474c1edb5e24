//! HTTP client tests against an in-process stub of the processing service

use media_workflow::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the stub saw
struct CapturedRequest {
    head: String,
    body: Vec<u8>,
}

impl CapturedRequest {
    fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

struct StubReply {
    status: &'static str,
    content_type: Option<&'static str>,
    body: Vec<u8>,
}

impl StubReply {
    fn ok(content_type: Option<&'static str>, body: impl Into<Vec<u8>>) -> Self {
        Self { status: "200 OK", content_type, body: body.into() }
    }

    fn status(status: &'static str) -> Self {
        Self { status, content_type: Some("text/plain"), body: b"nope".to_vec() }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Serve exactly one request, then close
async fn stub_server(reply: StubReply) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];

        let header_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let lower = head.to_ascii_lowercase();

        let content_length = lower
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap());

        match content_length {
            Some(len) => {
                while buf.len() < header_end + len {
                    let n = stream.read(&mut chunk).await.unwrap();
                    assert!(n > 0);
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
            // Chunked: read until the terminating chunk
            None => {
                while find(&buf[header_end..], b"0\r\n\r\n").is_none() {
                    let n = stream.read(&mut chunk).await.unwrap();
                    assert!(n > 0);
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
        }
        let body = buf[header_end..].to_vec();

        let mut response = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n", reply.status, reply.body.len());
        if let Some(ct) = reply.content_type {
            response.push_str(&format!("Content-Type: {}\r\n", ct));
        }
        response.push_str("\r\n");
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.write_all(&reply.body).await.unwrap();
        stream.flush().await.unwrap();

        CapturedRequest { head, body }
    });

    (base_url, handle)
}

fn client(base_url: String) -> HttpProcessingClient {
    HttpProcessingClient::new(ServiceConfig { base_url, timeout_secs: Some(10) }).unwrap()
}

fn jpeg_blob(name: &str) -> MediaBlob {
    MediaBlob::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3])
}

#[tokio::test]
async fn test_adjust_posts_file_and_params() {
    let (url, server) = stub_server(StubReply::ok(Some("image/png"), vec![9u8; 32])).await;
    let mut params = AdjustmentVector::default();
    params.hue = 0.5;

    let output = client(url)
        .process(ProcessingRequest::Adjust { media: jpeg_blob("cat.jpg"), params })
        .await
        .unwrap();

    let captured = server.await.unwrap();
    assert!(captured.request_line().starts_with("POST /adjust "));
    assert!(captured.head.to_ascii_lowercase().contains("multipart/form-data"));

    let body = captured.body_text();
    assert!(body.contains(r#"name="file"; filename="cat.jpg""#));
    assert!(body.contains("image/jpeg"));
    assert!(body.contains(r#"name="params""#));
    assert!(body.contains(r#""hue":0.5"#));

    match output {
        ProcessingOutput::Media(blob) => {
            assert_eq!(blob.mime_type(), "image/png");
            assert_eq!(blob.len(), 32);
        }
        other => panic!("unexpected output {:?}", other),
    }
}

#[tokio::test]
async fn test_style_transfer_fields() {
    let (url, server) = stub_server(StubReply::ok(Some("image/jpeg"), vec![1u8; 4])).await;

    client(url)
        .process(ProcessingRequest::StyleTransfer { content: jpeg_blob("me.jpg"), style: "monet".to_string() })
        .await
        .unwrap();

    let captured = server.await.unwrap();
    assert!(captured.request_line().starts_with("POST /style-transfer "));
    let body = captured.body_text();
    assert!(body.contains(r#"name="content_file"; filename="me.jpg""#));
    assert!(body.contains(r#"name="style_name""#));
    assert!(body.contains("monet"));
}

#[tokio::test]
async fn test_detect_parses_results() {
    let payload = r#"{"results":[
        {"bbox":[10,20,110,220],"class":"person","confidence":0.91},
        {"bbox":[5.5,6,7,8],"class":"cup","confidence":0.4}
    ]}"#;
    let (url, server) = stub_server(StubReply::ok(Some("application/json"), payload)).await;

    let output = client(url)
        .process(ProcessingRequest::Detect { media: jpeg_blob("room.jpg") })
        .await
        .unwrap();

    let captured = server.await.unwrap();
    assert!(captured.request_line().starts_with("POST /detect "));

    match output {
        ProcessingOutput::Detections(found) => {
            assert_eq!(found.len(), 2);
            assert_eq!(found[0].class_label, "person");
            assert_eq!(found[0].bbox, [10.0, 20.0, 110.0, 220.0]);
            assert_eq!(found[1].label(), "cup 40%");
        }
        other => panic!("unexpected output {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_content_type_falls_back_to_submitted_type() {
    let (url, server) = stub_server(StubReply::ok(None, vec![7u8; 3])).await;

    let output = client(url)
        .process(ProcessingRequest::Adjust { media: jpeg_blob("a.jpg"), params: AdjustmentVector::default() })
        .await
        .unwrap();
    server.await.unwrap();

    assert_eq!(output, ProcessingOutput::Media(MediaBlob::new("a.jpg", "image/jpeg", vec![7u8; 3])));
}

#[tokio::test]
async fn test_server_error_is_submission_failure() {
    let (url, server) = stub_server(StubReply::status("500 Internal Server Error")).await;

    let result = client(url)
        .process(ProcessingRequest::Detect { media: jpeg_blob("a.jpg") })
        .await;
    server.await.unwrap();

    assert!(matches!(result, Err(MediaError::SubmissionFailed(_))));
}

#[tokio::test]
async fn test_malformed_detection_payload() {
    let (url, server) = stub_server(StubReply::ok(Some("application/json"), r#"{"boxes":[]}"#)).await;

    let result = client(url)
        .process(ProcessingRequest::Detect { media: jpeg_blob("a.jpg") })
        .await;
    server.await.unwrap();

    assert!(matches!(result, Err(MediaError::SubmissionFailed(_))));
}

#[tokio::test]
async fn test_unreachable_service() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = client(url)
        .process(ProcessingRequest::Detect { media: jpeg_blob("a.jpg") })
        .await;
    assert!(matches!(result, Err(MediaError::SubmissionFailed(_))));
}

#[tokio::test]
async fn test_screen_over_http() {
    let (url, server) = stub_server(StubReply::ok(Some("image/jpeg"), vec![3u8; 64])).await;
    let http = client(url);
    let registry = UrlRegistry::new();
    let mut editor = Screen::new(ScreenConfig::image_editor(), registry.clone()).unwrap();

    let bytes = jpeg_blob("x").bytes().to_vec();
    editor
        .acquire(MediaSource::file(MediaFile::new("beach.jpg", Some("image/jpeg"), bytes)))
        .unwrap();
    editor.set_parameter(Parameter::Brightness, 1.2);

    let completion = editor.submit(&http).await.unwrap();
    server.await.unwrap();

    assert_eq!(completion, Some(Completion::Applied(SessionStatus::Succeeded)));
    let download = editor.download().unwrap();
    assert_eq!(download.name(), "processed_beach.jpg");
    assert_eq!(download.bytes(), &[3u8; 64][..]);
}
