//! Integration tests for the chunk ingest endpoint.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestServer;
use common::fixtures::{
    Part, chunk_request, chunk_request_with_hash, json_request, multipart_request,
    patterned_bytes, sample_record, send, sha256_hex,
};
use serde_json::json;

#[tokio::test]
async fn unknown_session_returns_404() {
    let server = TestServer::new().await;
    let request = chunk_request(&"a".repeat(64), 0, b"data");

    let (status, body) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "session_missing");
}

#[tokio::test]
async fn missing_fields_return_422() {
    let server = TestServer::new().await;

    // No chunk_hash field.
    let request = multipart_request(
        "/v1/uploads/chunk",
        &[
            ("upload_id", Part::Text("a".repeat(64))),
            ("chunk_index", Part::Text("0".to_string())),
            ("chunk_data", Part::Bytes(b"data".to_vec())),
        ],
    );
    let (status, body) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "unprocessable");
}

#[tokio::test]
async fn malformed_field_shapes_return_422() {
    let server = TestServer::new().await;
    let data = b"data";

    // Non-numeric index.
    let request = multipart_request(
        "/v1/uploads/chunk",
        &[
            ("upload_id", Part::Text("a".repeat(64))),
            ("chunk_index", Part::Text("minus-one".to_string())),
            ("chunk_data", Part::Bytes(data.to_vec())),
            ("chunk_hash", Part::Text(sha256_hex(data))),
        ],
    );
    let (status, _) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Hash is not 64 hex chars.
    let request = chunk_request_with_hash(&"a".repeat(64), 0, data, "abcd");
    let (status, _) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Upload id is not a 64-hex token.
    let request = chunk_request("../../etc/passwd", 0, data);
    let (status, _) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn hash_mismatch_returns_409_and_writes_nothing() {
    let server = TestServer::new().await;
    let record = sample_record("data.bin", 10, 4, 3, None);
    server.seed_session(&record).await;
    let id = record.upload_id.to_string();

    let data = patterned_bytes(4);
    let wrong_hash = sha256_hex(b"different bytes");
    let request = chunk_request_with_hash(&id, 0, &data, &wrong_hash);

    let (status, body) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["chunkIndex"], 0);

    // Nothing was written or recorded.
    let (status, body) = send(&server.router, json_request("GET", &format!("/v1/uploads/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received_chunks"], json!([]));
    assert!(server.finalized_files().is_empty());
}

#[tokio::test]
async fn hash_mismatch_recovery_accepts_resubmission() {
    let server = TestServer::new().await;
    let record = sample_record("data.bin", 10, 4, 3, None);
    server.seed_session(&record).await;
    let id = record.upload_id.to_string();
    let data = patterned_bytes(4);

    let bad = chunk_request_with_hash(&id, 0, &data, &sha256_hex(b"other"));
    let (status, _) = send(&server.router, bad).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let good = chunk_request(&id, 0, &data);
    let (status, body) = send(&server.router, good).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], 1);
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn duplicate_chunk_is_idempotent() {
    let server = TestServer::new().await;
    let record = sample_record("data.bin", 10, 4, 3, None);
    server.seed_session(&record).await;
    let id = record.upload_id.to_string();
    let data = patterned_bytes(4);

    let (status, body) = send(&server.router, chunk_request(&id, 0, &data)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], 1);

    // Same chunk again: same file state, same received set.
    let (status, body) = send(&server.router, chunk_request(&id, 0, &data)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], 1);

    let (_, body) = send(&server.router, json_request("GET", &format!("/v1/uploads/{id}"), None)).await;
    assert_eq!(body["received_chunks"], json!([0]));
}

#[tokio::test]
async fn out_of_range_index_returns_422() {
    let server = TestServer::new().await;
    let record = sample_record("data.bin", 10, 4, 3, None);
    server.seed_session(&record).await;

    let data = patterned_bytes(4);
    let request = chunk_request(&record.upload_id.to_string(), 3, &data);
    let (status, _) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn wrong_chunk_length_returns_422() {
    let server = TestServer::new().await;
    let record = sample_record("data.bin", 10, 4, 3, None);
    server.seed_session(&record).await;
    let id = record.upload_id.to_string();

    // Chunk 0 must be exactly 4 bytes.
    let (status, _) = send(&server.router, chunk_request(&id, 0, &patterned_bytes(3))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // The last chunk must be exactly the 2 remaining bytes.
    let (status, _) = send(&server.router, chunk_request(&id, 2, &patterned_bytes(4))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn progress_reflects_received_over_total() {
    let server = TestServer::new().await;
    let record = sample_record("data.bin", 10, 4, 3, None);
    server.seed_session(&record).await;
    let id = record.upload_id.to_string();

    let (_, body) = send(&server.router, chunk_request(&id, 1, &patterned_bytes(4))).await;
    let progress = body["progress"].as_f64().unwrap();
    assert!((progress - 100.0 / 3.0).abs() < 0.01);
    assert_eq!(body["received"], 1);
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn gate_rejects_unsigned_requests() {
    let secret = "test-gate-secret";
    let token_hash = sha256_hex(secret.as_bytes());
    let server = TestServer::with_config(move |config| {
        config.gate.token_hash = Some(token_hash);
    })
    .await;

    // No token: 401 before any session work.
    let (status, body) = send(&server.router, chunk_request(&"a".repeat(64), 0, b"data")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    // Wrong token: 401.
    let mut request = chunk_request(&"a".repeat(64), 0, b"data");
    request
        .headers_mut()
        .insert("authorization", "Bearer wrong".parse().unwrap());
    let (status, _) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Correct token passes the gate and reaches session lookup.
    let mut request = chunk_request(&"a".repeat(64), 0, b"data");
    request
        .headers_mut()
        .insert("authorization", format!("Bearer {secret}").parse().unwrap());
    let (status, _) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Health stays reachable without a token.
    let (status, _) = send(&server.router, json_request("GET", "/v1/health", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_and_metrics_endpoints() {
    let server = TestServer::new().await;

    let (status, body) = send(&server.router, json_request("GET", "/v1/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "filesystem");

    use tower::ServiceExt;
    let request = Request::builder()
        .method("GET")
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
