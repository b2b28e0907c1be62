//! End-to-end dispatch against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port and sends real HTTP through the
//! reqwest-backed factory. The echo routes report what actually arrived on
//! the wire, so these tests check encoding and header handling as the
//! server sees them rather than as the builder describes them.

use std::io::Write;
use std::sync::Arc;

use dispatch_core::{
    ByteStream, DispatchError, DispatcherConfig, FieldBag, FileUpload, RequestBody,
    RequestDescription, RequestDispatcher, ReqwestClientFactory, ResponseEnvelope,
};
use mock_server::{Echo, EchoPart};
use serde::{Deserialize, Serialize};
use serde_json::json;

async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { mock_server::run(listener).await });
    format!("http://{addr}/")
}

async fn dispatcher() -> RequestDispatcher {
    let base_url = start_server().await;
    RequestDispatcher::new(&base_url, ReqwestClientFactory::new()).unwrap()
}

#[derive(Debug, Serialize)]
struct CreateTodo {
    title: String,
    completed: bool,
}

#[tokio::test]
async fn structured_body_is_sent_as_json() {
    let d = dispatcher().await;
    let body = CreateTodo {
        title: "Buy milk".to_string(),
        completed: false,
    };
    let envelope: ResponseEnvelope<Echo> = d
        .send_request(RequestDescription::post("echo/todos").body(RequestBody::json(&body).unwrap()))
        .await
        .unwrap();

    assert!(envelope.success);
    assert_eq!(envelope.status_code, 200);
    let echo = envelope.payload.unwrap();
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.path, "/echo/todos");
    assert_eq!(echo.body, serde_json::to_string(&body).unwrap());
    let content_type = echo.content_type.unwrap();
    assert_eq!(content_type.split(';').next(), Some("application/json"));
}

#[tokio::test]
async fn custom_header_arrives_verbatim() {
    let d = dispatcher().await;
    let envelope: ResponseEnvelope<Echo> = d
        .send_request(RequestDescription::get("echo?x=1").header("X-Trace", "abc"))
        .await
        .unwrap();

    let echo = envelope.payload.unwrap();
    assert_eq!(echo.headers.get("x-trace").map(String::as_str), Some("abc"));
    assert_eq!(echo.query.as_deref(), Some("x=1"));
}

#[tokio::test]
async fn malformed_header_does_not_abort_the_call() {
    let d = dispatcher().await;
    let envelope: ResponseEnvelope<Echo> = d
        .send_request(
            RequestDescription::get("echo")
                .header("bad header", "x")
                .header("X-Ok", "yes"),
        )
        .await
        .unwrap();

    assert!(envelope.success);
    let echo = envelope.payload.unwrap();
    assert_eq!(echo.headers.get("x-ok").map(String::as_str), Some("yes"));
    assert!(!echo.headers.contains_key("bad header"));
}

#[tokio::test]
async fn raw_bytes_are_sent_without_content_type() {
    let d = dispatcher().await;
    let envelope: ResponseEnvelope<Echo> = d
        .send_request(RequestDescription::put("echo/blob").body(b"raw payload".to_vec()))
        .await
        .unwrap();

    let echo = envelope.payload.unwrap();
    assert_eq!(echo.body, "raw payload");
    assert_eq!(echo.content_type, None);
    assert_eq!(echo.headers.get("content-length").map(String::as_str), Some("11"));
}

#[tokio::test]
async fn caller_framing_headers_do_not_truncate_the_body() {
    let d = dispatcher().await;
    let envelope: ResponseEnvelope<Echo> = d
        .send_request(
            RequestDescription::put("echo/blob")
                .header("Content-Length", "3")
                .header("Host", "elsewhere.invalid")
                .body(b"raw payload".to_vec()),
        )
        .await
        .unwrap();

    let echo = envelope.payload.unwrap();
    assert_eq!(echo.body, "raw payload");
    assert_eq!(echo.headers.get("content-length").map(String::as_str), Some("11"));
    assert_ne!(echo.headers.get("host").map(String::as_str), Some("elsewhere.invalid"));

    // The pooled connection is still in sync for the next call.
    let envelope: ResponseEnvelope<Echo> = d
        .send_request(RequestDescription::get("echo/next"))
        .await
        .unwrap();
    let echo = envelope.payload.unwrap();
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.path, "/echo/next");
}

#[tokio::test]
async fn structured_body_keeps_number_precision_on_the_wire() {
    #[derive(Serialize)]
    struct Reading {
        value: f32,
        id: u128,
    }

    let d = dispatcher().await;
    let reading = Reading {
        value: 0.1,
        id: u64::MAX as u128 + 1,
    };
    let envelope: ResponseEnvelope<Echo> = d
        .send_request(RequestDescription::post("echo/readings").body(RequestBody::json(&reading).unwrap()))
        .await
        .unwrap();

    let echo = envelope.payload.unwrap();
    assert_eq!(echo.body, r#"{"value":0.1,"id":18446744073709551616}"#);
}

#[tokio::test]
async fn stream_body_is_sent() {
    let d = dispatcher().await;
    let chunks: Vec<std::io::Result<bytes::Bytes>> = vec![
        Ok(bytes::Bytes::from("first,")),
        Ok(bytes::Bytes::from("second")),
    ];
    let stream = ByteStream::new(futures::stream::iter(chunks));
    let envelope: ResponseEnvelope<Echo> = d
        .send_request(RequestDescription::post("echo/stream").body(stream))
        .await
        .unwrap();

    let echo = envelope.payload.unwrap();
    assert_eq!(echo.body, "first,second");
}

#[tokio::test]
async fn file_and_text_fields_upload_as_two_parts() {
    let d = dispatcher().await;
    let bag = FieldBag::new()
        .file(
            "report",
            FileUpload::from_bytes("q3.csv", "a,b\n1,2\n").with_content_type("text/csv"),
        )
        .text("comment", "quarterly numbers");
    let envelope: ResponseEnvelope<Vec<EchoPart>> = d
        .send_request(RequestDescription::post("upload").form(bag))
        .await
        .unwrap();

    assert!(envelope.success);
    assert_eq!(
        envelope.payload.unwrap(),
        vec![
            EchoPart {
                name: "report".to_string(),
                file_name: Some("q3.csv".to_string()),
                content_type: Some("text/csv".to_string()),
                body: "a,b\n1,2\n".to_string(),
            },
            EchoPart {
                name: "comment".to_string(),
                file_name: None,
                content_type: None,
                body: "quarterly numbers".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn file_on_disk_is_streamed_into_its_part() {
    let path = std::env::temp_dir().join(format!("dispatch-core-upload-{}.txt", std::process::id()));
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"from disk")
        .unwrap();

    let d = dispatcher().await;
    let bag = FieldBag::new()
        .file("doc", FileUpload::from_path(&path))
        .bytes("blob", vec![b'z'; 3])
        .field("skipped", Option::<String>::None);
    let envelope: ResponseEnvelope<Vec<EchoPart>> = d
        .send_request(RequestDescription::post("upload").form(bag))
        .await
        .unwrap();
    std::fs::remove_file(&path).ok();

    let parts = envelope.payload.unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].name, "doc");
    assert_eq!(parts[0].body, "from disk");
    assert_eq!(
        parts[0].file_name.as_deref(),
        path.file_name().and_then(|n| n.to_str())
    );
    assert_eq!(parts[1].name, "blob");
    assert_eq!(parts[1].body, "zzz");
}

#[tokio::test]
async fn form_flag_turns_object_into_text_parts() {
    let d = dispatcher().await;
    let envelope: ResponseEnvelope<Vec<EchoPart>> = d
        .send_request(
            RequestDescription::post("upload")
                .body(json!({"name": "Ada", "age": 36, "nickname": null}))
                .form_data(true),
        )
        .await
        .unwrap();

    let parts = envelope.payload.unwrap();
    let fields: Vec<(&str, &str)> = parts
        .iter()
        .map(|p| (p.name.as_str(), p.body.as_str()))
        .collect();
    assert_eq!(fields, vec![("name", "Ada"), ("age", "36")]);
}

#[tokio::test]
async fn undecodable_success_body_has_no_payload() {
    let d = dispatcher().await;
    let envelope: ResponseEnvelope<Echo> = d
        .send_request(RequestDescription::get("malformed"))
        .await
        .unwrap();

    assert!(envelope.success);
    assert_eq!(envelope.status_code, 200);
    assert!(envelope.payload.is_none());
}

#[tokio::test]
async fn empty_body_has_no_payload() {
    let d = dispatcher().await;
    let envelope: ResponseEnvelope<serde_json::Value> = d
        .send_request(RequestDescription::get("empty"))
        .await
        .unwrap();

    assert_eq!(envelope, ResponseEnvelope::new(true, 200, None));
}

#[tokio::test]
async fn error_status_is_reported_in_the_envelope() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct StatusBody {
        status: u16,
    }

    let d = dispatcher().await;
    let envelope: ResponseEnvelope<StatusBody> = d
        .send_request(RequestDescription::get("status/418"))
        .await
        .unwrap();

    assert!(!envelope.success);
    assert_eq!(envelope.status_code, 418);
    assert_eq!(envelope.payload, Some(StatusBody { status: 418 }));
}

#[tokio::test]
async fn empty_relative_url_is_rejected() {
    let d = dispatcher().await;
    let err = d
        .send_request::<Echo>(RequestDescription::get(""))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidArgument { .. }));
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let d = RequestDispatcher::new(&format!("http://{addr}/"), ReqwestClientFactory::new()).unwrap();
    let err = d
        .send_request::<Echo>(RequestDescription::get("echo"))
        .await
        .unwrap_err();
    assert!(err.is_transport(), "unexpected error: {err}");
}

#[tokio::test]
async fn dispatcher_from_config() {
    let base_url = start_server().await;
    let mut config = DispatcherConfig::new(base_url);
    config.client.user_agent = Some("dispatch-test/1.0".to_string());
    let d = RequestDispatcher::from_config(&config).unwrap();

    let envelope: ResponseEnvelope<Echo> = d.send_request(RequestDescription::get("echo")).await.unwrap();
    let echo = envelope.payload.unwrap();
    assert_eq!(
        echo.headers.get("user-agent").map(String::as_str),
        Some("dispatch-test/1.0")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_do_not_interfere() {
    let d = Arc::new(dispatcher().await);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let d = Arc::clone(&d);
            tokio::spawn(async move {
                let request = RequestDescription::post(format!("echo/{i}"))
                    .header("X-Call", i.to_string())
                    .body(json!({ "call": i }));
                let envelope: ResponseEnvelope<Echo> = d.send_request(request).await.unwrap();
                (i, envelope.payload.unwrap())
            })
        })
        .collect();

    for handle in handles {
        let (i, echo) = handle.await.unwrap();
        assert_eq!(echo.path, format!("/echo/{i}"));
        assert_eq!(echo.headers["x-call"], i.to_string());
        assert_eq!(echo.body, format!(r#"{{"call":{i}}}"#));
    }
}
