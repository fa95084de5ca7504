// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-process PaddleOCR engine on ONNX Runtime
//!
//! Components:
//! - `detection` - text region detection (DB probability map)
//! - `classifier` - optional 180° text line correction
//! - `recognition` - CTC text recognition per region
//! - `preprocessing` - tensor preparation for all three models
//!
//! Expected files in the model directory:
//! - `det_model.onnx`
//! - `cls_model.onnx` (angle classification only)
//! - `<family>_rec.onnx` and `<family>_dict.txt`, `<family>` from
//!   [`recognition_family`]

pub mod classifier;
pub mod detection;
pub mod preprocessing;
pub mod recognition;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::EngineConfig;
use super::error::EngineError;
use super::raw_result::{Detection, RawResult};
use super::OcrEngine;
use classifier::AngleClassifier;
use detection::{TextBox, TextDetector};
use recognition::TextRecognizer;

/// Recognition model family serving a PaddleOCR language code
pub fn recognition_family(language: &str) -> Option<&'static str> {
    let family = match language.to_lowercase().as_str() {
        "en" => "en",
        "ch" | "zh" | "chinese_cht" => "ch",
        "ja" | "japan" => "japan",
        "ko" | "korean" => "korean",
        "vi" | "fr" | "de" | "es" | "pt" | "it" | "nl" | "pl" | "ro" | "id" | "ms" | "tr"
        | "sv" | "da" | "no" | "cs" | "hu" | "hr" | "sk" | "sl" | "latin" => "latin",
        "ru" | "uk" | "be" | "bg" | "cyrillic" => "cyrillic",
        "ar" | "fa" | "ur" | "arabic" => "arabic",
        _ => return None,
    };
    Some(family)
}

/// Open an ONNX session, trying CUDA first when acceleration is requested
pub(crate) fn build_session(model_path: &Path, accelerator: bool) -> Result<Session> {
    if !model_path.exists() {
        anyhow::bail!("ONNX model not found: {}", model_path.display());
    }

    if accelerator {
        let cuda = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .context("Failed to set CUDA execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .commit_from_file(model_path);

        match cuda {
            Ok(session) => {
                info!("✅ {} loaded with CUDA", model_path.display());
                return Ok(session);
            }
            Err(e) => {
                warn!("⚠️ CUDA unavailable for {}: {}", model_path.display(), e);
                warn!("   Falling back to CPU execution provider");
            }
        }
    }

    let session = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(4)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

    info!("✅ {} loaded (CPU)", model_path.display());
    Ok(session)
}

pub(crate) fn first_input_name(session: &Session) -> String {
    session
        .inputs
        .first()
        .map(|input| input.name.clone())
        .unwrap_or_else(|| "x".to_string())
}

/// Model file locations derived from the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFiles {
    pub detection: PathBuf,
    pub classifier: PathBuf,
    pub recognition: PathBuf,
    pub dictionary: PathBuf,
}

impl ModelFiles {
    pub fn resolve(model_dir: &Path, language: &str) -> Result<Self, EngineError> {
        let family = recognition_family(language).ok_or_else(|| {
            EngineError::InvalidConfig(format!("unsupported language '{}'", language))
        })?;
        Ok(Self {
            detection: model_dir.join("det_model.onnx"),
            classifier: model_dir.join("cls_model.onnx"),
            recognition: model_dir.join(format!("{}_rec.onnx", family)),
            dictionary: model_dir.join(format!("{}_dict.txt", family)),
        })
    }
}

/// Stages enabled for this process
struct Pipeline {
    detector: Option<TextDetector>,
    classifier: Option<AngleClassifier>,
    recognizer: Option<TextRecognizer>,
}

impl Pipeline {
    fn run(&self, image_path: &Path) -> Result<RawResult, EngineError> {
        let image = image::open(image_path)
            .map_err(|e| EngineError::Recognition(format!("failed to decode image: {}", e)))?;
        let (width, height) = image.dimensions();
        debug!("Decoded {}: {}x{}", image_path.display(), width, height);

        let regions = match &self.detector {
            Some(detector) => detector.detect(&image).map_err(EngineError::recognition)?,
            None => vec![TextBox::full_image(width, height)],
        };

        let Some(recognizer) = &self.recognizer else {
            return Ok(RawResult::Unrecognized(format!(
                "detection-only output ({} boxes)",
                regions.len()
            )));
        };

        let mut detections = Vec::with_capacity(regions.len());
        for region in &regions {
            let Some(crop) = self.crop(&image, region)? else {
                continue;
            };
            let recognized = recognizer
                .recognize(&crop)
                .map_err(EngineError::recognition)?;
            if recognized.text.trim().is_empty() {
                continue;
            }
            detections.push(Detection {
                geometry: region.polygon(),
                text: recognized.text,
                confidence: recognized.confidence as f64,
            });
        }

        if detections.is_empty() {
            Ok(RawResult::Empty)
        } else {
            Ok(RawResult::Detections(detections))
        }
    }

    fn crop(&self, image: &DynamicImage, region: &TextBox) -> Result<Option<DynamicImage>, EngineError> {
        let (width, height) = image.dimensions();
        let Some((x, y, w, h)) = region.crop_rect(width, height) else {
            return Ok(None);
        };
        let crop = image.crop_imm(x, y, w, h);
        match &self.classifier {
            Some(classifier) => classifier
                .upright(crop)
                .map(Some)
                .map_err(EngineError::recognition),
            None => Ok(Some(crop)),
        }
    }
}

/// PaddleOCR models executed with ONNX Runtime
///
/// Each session sits behind its own mutex, so concurrent requests queue per
/// stage. Inference runs on the blocking thread pool.
pub struct OnnxOcrEngine {
    pipeline: Arc<Pipeline>,
    name: String,
}

impl OnnxOcrEngine {
    pub async fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        if !config.model_dir.is_dir() {
            return Err(EngineError::Initialization(format!(
                "model directory not found: {}",
                config.model_dir.display()
            )));
        }

        let files = ModelFiles::resolve(&config.model_dir, &config.language)?;
        let accelerator = config.accelerator;
        let (detect, classify, recognize) =
            (config.detect, config.angle_classification, config.recognize);

        let pipeline = tokio::task::spawn_blocking(move || -> Result<Pipeline> {
            let detector = detect
                .then(|| TextDetector::load(&files.detection, accelerator))
                .transpose()?;
            let classifier = classify
                .then(|| AngleClassifier::load(&files.classifier, accelerator))
                .transpose()?;
            let recognizer = recognize
                .then(|| TextRecognizer::load(&files.recognition, &files.dictionary, accelerator))
                .transpose()?;
            Ok(Pipeline {
                detector,
                classifier,
                recognizer,
            })
        })
        .await
        .map_err(|e| EngineError::Initialization(format!("model loading task failed: {}", e)))?
        .map_err(EngineError::init)?;

        Ok(Self {
            pipeline: Arc::new(pipeline),
            name: format!("onnx:{}", config.language),
        })
    }
}

#[async_trait]
impl OcrEngine for OnnxOcrEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recognize(&self, image_path: &Path) -> Result<RawResult, EngineError> {
        let pipeline = self.pipeline.clone();
        let path = image_path.to_path_buf();
        tokio::task::spawn_blocking(move || pipeline.run(&path))
            .await
            .map_err(|e| EngineError::Recognition(format!("inference task failed: {}", e)))?
    }
}
