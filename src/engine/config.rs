// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Engine configuration

use clap::ValueEnum;
use std::fmt;
use std::path::PathBuf;

use super::error::EngineError;

/// Which engine implementation backs the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineBackend {
    /// PaddleOCR ONNX models run in-process
    Onnx,
    /// Long-lived PaddleOCR worker process
    Paddle,
}

impl fmt::Display for EngineBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineBackend::Onnx => write!(f, "onnx"),
            EngineBackend::Paddle => write!(f, "paddle"),
        }
    }
}

/// Fixed engine configuration, applied once at startup
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub backend: EngineBackend,
    /// Target language, PaddleOCR style code (`vi`, `en`, `ch`, ...)
    pub language: String,
    /// Run text detection before recognition
    pub detect: bool,
    /// Run the recognition stage
    pub recognize: bool,
    /// Correct upside-down text lines before recognition
    pub angle_classification: bool,
    /// Request hardware acceleration (CUDA for ONNX, GPU for PaddleOCR)
    pub accelerator: bool,
    /// Directory holding the ONNX models and dictionaries
    pub model_dir: PathBuf,
    /// Python interpreter used to launch the PaddleOCR worker
    pub python: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: EngineBackend::Onnx,
            language: "vi".to_string(),
            detect: true,
            recognize: true,
            angle_classification: false,
            accelerator: false,
            model_dir: PathBuf::from("./models/paddleocr-onnx"),
            python: "python3".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.language.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "language must not be empty".to_string(),
            ));
        }
        if self.backend == EngineBackend::Paddle && self.python.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "python interpreter must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
