// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::response::OcrResponse;
use super::upload::{persist, read_image_field};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::engine::{normalize, EngineError};

/// POST /ocr - Extract text lines from an uploaded image
///
/// # Request
/// - multipart/form-data with the image in the `image` field
///
/// # Response
/// - `lines`: recognized text with confidence, in reading order
///
/// # Errors
/// - 400 Bad Request: no image uploaded
/// - 413 Payload Too Large: body over the configured upload limit
/// - 500 Internal Server Error: storing the upload or running OCR failed
/// - 504 Gateway Timeout: the engine did not answer in time
pub async fn ocr_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<OcrResponse>, ApiError> {
    let upload = read_image_field(multipart).await?;
    debug!(
        "OCR request received: {:?}, {} bytes",
        upload.file_name,
        upload.bytes.len()
    );

    let start = Instant::now();
    let temp_file = persist(upload, state.config.upload_dir.clone()).await?;

    let timeout = state.config.request_timeout;
    let raw = tokio::time::timeout(timeout, state.engine.recognize(temp_file.path()))
        .await
        .map_err(|_| EngineError::Timeout(timeout))??;
    debug!("Raw OCR result: {:?}", raw);

    // Delete the upload before answering
    drop(temp_file);

    let lines = normalize(raw);
    info!(
        "OCR complete: {} lines, {}ms",
        lines.len(),
        start.elapsed().as_millis()
    );

    Ok(Json(OcrResponse::new(lines)))
}
