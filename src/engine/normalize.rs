// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Raw result normalization into recognition lines

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::raw_result::RawResult;

/// One recognized text fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionLine {
    pub text: String,
    /// Confidence score (0.0-1.0 for well-formed engine output)
    pub confidence: f64,
}

impl RecognitionLine {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Flatten any raw result into lines, preserving engine reading order
///
/// Unrecognized layouts produce no lines. They are logged, not reported as
/// errors: an image without readable text is a valid outcome.
pub fn normalize(raw: RawResult) -> Vec<RecognitionLine> {
    match raw {
        RawResult::Empty => Vec::new(),
        RawResult::Detections(detections) => detections
            .into_iter()
            .map(|d| RecognitionLine::new(d.text, d.confidence))
            .collect(),
        RawResult::ParallelArrays { texts, scores } => {
            if texts.len() != scores.len() {
                warn!(
                    "⚠️ rec_texts has {} entries but rec_scores has {}, pairing the first {}",
                    texts.len(),
                    scores.len(),
                    texts.len().min(scores.len())
                );
            }
            texts
                .into_iter()
                .zip(scores)
                .map(|(text, score)| RecognitionLine::new(text, score))
                .collect()
        }
        RawResult::Unrecognized(description) => {
            warn!("⚠️ Unexpected OCR result format: {}", description);
            Vec::new()
        }
    }
}
