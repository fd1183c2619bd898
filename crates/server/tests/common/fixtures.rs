//! Test data helpers.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use sluice_core::hash::{ChunkHash, FileHash};
use sluice_core::session::{FileInfo, SessionRecord};
use tower::ServiceExt;

/// Multipart boundary used by all hand-built bodies.
pub const BOUNDARY: &str = "sluice-test-boundary";

/// One multipart field value.
#[allow(dead_code)]
pub enum Part {
    Text(String),
    Bytes(Vec<u8>),
}

/// Deterministic non-repeating test bytes.
#[allow(dead_code)]
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Hex SHA-256 of a byte slice.
#[allow(dead_code)]
pub fn sha256_hex(data: &[u8]) -> String {
    ChunkHash::compute(data).to_hex()
}

/// Build a multipart/form-data request from named fields.
#[allow(dead_code)]
pub fn multipart_request(uri: &str, fields: &[(&str, Part)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, part) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::Bytes(bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"blob\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Build a chunk ingest request with a correct hash.
#[allow(dead_code)]
pub fn chunk_request(upload_id: &str, index: u32, data: &[u8]) -> Request<Body> {
    chunk_request_with_hash(upload_id, index, data, &sha256_hex(data))
}

/// Build a chunk ingest request with an explicit hash value.
#[allow(dead_code)]
pub fn chunk_request_with_hash(
    upload_id: &str,
    index: u32,
    data: &[u8],
    hash: &str,
) -> Request<Body> {
    multipart_request(
        "/v1/uploads/chunk",
        &[
            ("upload_id", Part::Text(upload_id.to_string())),
            ("chunk_index", Part::Text(index.to_string())),
            ("chunk_data", Part::Bytes(data.to_vec())),
            ("chunk_hash", Part::Text(hash.to_string())),
        ],
    )
}

/// Build a JSON request.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

/// Send a request through the router and decode the JSON response.
#[allow(dead_code)]
pub async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Build a session record for seeding the store.
#[allow(dead_code)]
pub fn sample_record(
    name: &str,
    size: u64,
    chunk_size: u64,
    total_chunks: u32,
    hash: Option<FileHash>,
) -> SessionRecord {
    SessionRecord::new(
        FileInfo {
            name: name.to_string(),
            content_type: "application/octet-stream".to_string(),
            size,
            hash,
        },
        chunk_size,
        total_chunks,
    )
}
