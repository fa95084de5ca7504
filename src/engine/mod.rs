// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR engine abstraction
//!
//! The gateway never implements text detection or recognition itself. It
//! holds one long-lived engine handle and calls `recognize` per request.
//!
//! Backends:
//! - `onnx` - PaddleOCR ONNX models executed in-process with ONNX Runtime
//! - `paddle` - a long-lived PaddleOCR worker process speaking JSON lines

pub mod config;
pub mod error;
pub mod normalize;
pub mod onnx;
pub mod raw_result;
pub mod worker;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub use config::{EngineBackend, EngineConfig};
pub use error::EngineError;
pub use normalize::{normalize, RecognitionLine};
pub use raw_result::{Detection, RawResult};

/// A recognition engine shared by every request
///
/// Implementations must tolerate concurrent calls. Engines that cannot run
/// two recognitions at once serialize internally.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Run OCR on the image stored at `image_path`
    async fn recognize(&self, image_path: &Path) -> Result<RawResult, EngineError>;
}

/// Shared, immutable engine handle
pub type EngineHandle = Arc<dyn OcrEngine>;

/// Build the engine selected by `config`
///
/// Called once at startup. Any error here is fatal for the process.
pub async fn initialize(config: &EngineConfig) -> Result<EngineHandle, EngineError> {
    config.validate()?;

    info!(
        "Initializing OCR engine (backend: {}, language: {}, detect: {}, recognize: {}, angle_cls: {}, accelerator: {})",
        config.backend,
        config.language,
        config.detect,
        config.recognize,
        config.angle_classification,
        config.accelerator
    );

    let engine: EngineHandle = match config.backend {
        EngineBackend::Onnx => Arc::new(onnx::OnnxOcrEngine::new(config).await?),
        EngineBackend::Paddle => Arc::new(worker::PaddleWorkerEngine::spawn(config).await?),
    };

    info!("✅ OCR engine '{}' initialized", engine.name());
    Ok(engine)
}
