// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /ocr tests
//!
//! These tests verify that the ocr_handler:
//! - Rejects requests without an image before touching the engine
//! - Answers 413 for uploads over the configured limit
//! - Returns normalized lines for every raw result shape
//! - Maps engine failures to 500 and timeouts to 504
//! - Never leaves a temp file behind
//! - Keeps concurrent requests isolated

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use ocr_gateway::engine::{Detection, RawResult};
use ocr_gateway::GatewayConfig;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot`

use super::support::{
    app_with, app_with_config, app_with_timeout, body_json, file_count, upload_request, EchoEngine, FailingEngine,
    FixedEngine, StalledEngine, BOUNDARY,
};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png";

fn hello_world() -> RawResult {
    RawResult::ParallelArrays {
        texts: vec!["Hello".to_string(), "World".to_string()],
        scores: vec![0.9, 0.5],
    }
}

#[cfg(test)]
mod missing_image_tests {
    use super::*;

    #[tokio::test]
    async fn test_wrong_field_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FixedEngine::new(hello_world());
        let app = app_with(engine.clone(), dir.path());

        let response = app
            .oneshot(upload_request("file", "scan.png", PNG_BYTES))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "No image uploaded"}));
        assert_eq!(engine.calls(), 0, "engine must not be called");
        assert_eq!(file_count(dir.path()), 0, "no temp file may be created");
    }

    #[tokio::test]
    async fn test_non_multipart_request_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FixedEngine::new(hello_world());
        let app = app_with(engine.clone(), dir.path());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/ocr")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"image": "aGVsbG8="}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "No image uploaded"}));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_form_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FixedEngine::new(hello_world());
        let app = app_with(engine.clone(), dir.path());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/ocr")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(format!("--{}--\r\n", BOUNDARY)))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_image_part_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FixedEngine::new(hello_world());
        let app = app_with(engine.clone(), dir.path());

        let response = app
            .oneshot(upload_request("image", "empty.png", b""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "No image uploaded"}));
        assert_eq!(engine.calls(), 0);
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_get_is_not_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(FixedEngine::new(hello_world()), dir.path());

        let request = Request::builder()
            .method(Method::GET)
            .uri("/ocr")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}

#[cfg(test)]
mod recognition_tests {
    use super::*;

    #[tokio::test]
    async fn test_parallel_arrays_become_lines() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FixedEngine::new(hello_world());
        let app = app_with(engine.clone(), dir.path());

        let response = app
            .oneshot(upload_request("image", "hello.png", PNG_BYTES))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"lines": [
                {"text": "Hello", "confidence": 0.9},
                {"text": "World", "confidence": 0.5}
            ]})
        );
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_detections_keep_reading_order_and_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let raw = RawResult::Detections(vec![
            Detection {
                geometry: vec![[0.0, 0.0], [90.0, 0.0], [90.0, 20.0], [0.0, 20.0]],
                text: "Cộng hòa xã hội".to_string(),
                confidence: 0.97,
            },
            Detection {
                geometry: vec![[0.0, 30.0], [90.0, 30.0], [90.0, 50.0], [0.0, 50.0]],
                text: "Độc lập".to_string(),
                confidence: 0.88,
            },
        ]);
        let app = app_with(FixedEngine::new(raw), dir.path());

        let response = app
            .oneshot(upload_request("image", "form.jpg", PNG_BYTES))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let lines = body["lines"].as_array().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["text"], "Cộng hòa xã hội");
        assert_eq!(lines[1]["text"], "Độc lập");
    }

    #[tokio::test]
    async fn test_empty_result_gives_empty_lines() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(FixedEngine::new(RawResult::Empty), dir.path());

        let response = app
            .oneshot(upload_request("image", "blank.png", PNG_BYTES))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"lines": []}));
    }

    #[tokio::test]
    async fn test_unrecognized_result_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let raw = RawResult::Unrecognized("object with keys [boxes]".to_string());
        let app = app_with(FixedEngine::new(raw), dir.path());

        let response = app
            .oneshot(upload_request("image", "odd.png", PNG_BYTES))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"lines": []}));
    }

    #[tokio::test]
    async fn test_other_fields_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(FixedEngine::new(hello_world()), dir.path());

        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nreceipt\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"a.png\"\r\n\
             Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
            b = BOUNDARY
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/ocr")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["lines"][0]["text"], "Hello");
    }
}

#[cfg(test)]
mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_engine_error_maps_to_500() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FailingEngine("cannot identify image file".to_string()));
        let app = app_with(engine, dir.path());

        let response = app
            .oneshot(upload_request("image", "broken.png", PNG_BYTES))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "OCR processing failed: cannot identify image file"})
        );
        assert_eq!(file_count(dir.path()), 0, "temp file must be released");
    }

    #[tokio::test]
    async fn test_engine_timeout_maps_to_504() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with_timeout(
            Arc::new(StalledEngine),
            dir.path(),
            Duration::from_millis(50),
        );

        let response = app
            .oneshot(upload_request("image", "slow.png", PNG_BYTES))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            body_json(response).await,
            json!({"error": "OCR processing failed: timed out after 0.05s"})
        );
        assert_eq!(file_count(dir.path()), 0, "temp file must be released");
    }

    #[tokio::test]
    async fn test_unwritable_upload_dir_maps_to_500() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let engine = FixedEngine::new(hello_world());
        let app = app_with(engine.clone(), &missing);

        let response = app
            .oneshot(upload_request("image", "scan.png", PNG_BYTES))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("OCR processing failed: "));
        assert_eq!(engine.calls(), 0);
    }
}

#[cfg(test)]
mod temp_file_tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_file_exists_during_call_and_is_removed_after() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(EchoEngine::default());
        let app = app_with(engine.clone(), dir.path());

        let response = app
            .oneshot(upload_request("image", "photo.JPG", b"xin chao"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["lines"][0]["text"], "xin chao");

        let seen = engine.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        let (path, existed) = &seen[0];
        assert!(existed, "engine must see the uploaded file");
        assert!(path.starts_with(dir.path()));
        assert_eq!(path.extension().unwrap(), "jpg");
        assert!(!path.exists());
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_file_count_unchanged_across_mixed_requests() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), b"keep me").unwrap();
        let before = file_count(dir.path());

        let ok = app_with(FixedEngine::new(hello_world()), dir.path());
        let failing = app_with(Arc::new(FailingEngine("boom".to_string())), dir.path());

        ok.clone()
            .oneshot(upload_request("image", "a.png", PNG_BYTES))
            .await
            .unwrap();
        ok.oneshot(upload_request("photo", "b.png", PNG_BYTES))
            .await
            .unwrap();
        failing
            .oneshot(upload_request("image", "c.png", PNG_BYTES))
            .await
            .unwrap();

        assert_eq!(file_count(dir.path()), before);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_get_their_own_lines() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(EchoEngine::default());
        let app = app_with(engine.clone(), dir.path());

        let requests = (0..16).map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let payload = format!("request-{}", i);
                let response = app
                    .oneshot(upload_request("image", "page.png", payload.as_bytes()))
                    .await
                    .unwrap();
                assert_eq!(response.status(), StatusCode::OK);
                (payload, body_json(response).await)
            })
        });

        for handle in futures::future::join_all(requests).await {
            let (payload, body) = handle.unwrap();
            let lines = body["lines"].as_array().unwrap();
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0]["text"], payload);
        }

        assert_eq!(engine.seen.lock().unwrap().len(), 16);
        assert_eq!(file_count(dir.path()), 0);
    }
}

#[cfg(test)]
mod upload_limit_tests {
    use super::*;

    fn limited_app(engine: Arc<FixedEngine>, dir: &std::path::Path) -> axum::Router {
        let config = GatewayConfig {
            upload_dir: dir.to_path_buf(),
            max_upload_bytes: 1024,
            ..GatewayConfig::default()
        };
        app_with_config(engine, config)
    }

    #[tokio::test]
    async fn test_oversized_upload_is_413() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FixedEngine::new(hello_world());
        let app = limited_app(engine.clone(), dir.path());

        let response = app
            .oneshot(upload_request("image", "scan.png", &[0u8; 4096]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Image exceeds the upload size limit"})
        );
        assert_eq!(engine.calls(), 0);
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_upload_under_limit_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FixedEngine::new(hello_world());
        let app = limited_app(engine.clone(), dir.path());

        let response = app
            .oneshot(upload_request("image", "scan.png", PNG_BYTES))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(engine.calls(), 1);
    }
}
