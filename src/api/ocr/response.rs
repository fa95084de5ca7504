// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR response types

use serde::{Deserialize, Serialize};

use crate::engine::RecognitionLine;

/// Response from OCR processing
///
/// `lines` is always present, empty when nothing was recognized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrResponse {
    pub lines: Vec<RecognitionLine>,
}

impl OcrResponse {
    pub fn new(lines: Vec<RecognitionLine>) -> Self {
        Self { lines }
    }
}
