// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart upload extraction and temp file persistence

use axum::body::Bytes;
use axum::http::StatusCode;
use axum_extra::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::api::errors::ApiError;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

const DEFAULT_SUFFIX: &str = ".png";

/// The uploaded image, held in memory until persisted
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl ImageUpload {
    /// Temp file suffix taken from the client's file name
    pub fn suffix(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_else(|| DEFAULT_SUFFIX.to_string())
    }
}

/// Pull the `image` field out of the request
///
/// Anything short of a non-empty `image` part is a missing upload, except a
/// body cut off by the upload limit.
pub async fn read_image_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ImageUpload, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        debug!("Request is not multipart: {}", e);
        ApiError::NoImage
    })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(ApiError::NoImage),
            Err(e) => return Err(body_error(e)),
        };

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(body_error)?;

        if bytes.is_empty() {
            return Err(ApiError::NoImage);
        }

        return Ok(ImageUpload { file_name, bytes });
    }
}

fn body_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("Upload rejected: {}", err);
        return ApiError::PayloadTooLarge;
    }
    warn!("Failed to read multipart body: {}", err);
    ApiError::NoImage
}

/// Write the upload into a fresh temp file that is removed on drop
pub async fn persist(upload: ImageUpload, dir: PathBuf) -> Result<NamedTempFile, ApiError> {
    let suffix = upload.suffix();
    tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("ocr-")
            .suffix(&suffix)
            .tempfile_in(&dir)?;
        file.write_all(&upload.bytes)?;
        file.flush()?;
        Ok(file)
    })
    .await
    .map_err(|e| ApiError::Processing(format!("failed to store upload: {}", e)))?
    .map_err(ApiError::from)
}
