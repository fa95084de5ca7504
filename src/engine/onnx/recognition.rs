// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PP-OCR text recognition
//!
//! The recognition model emits one class distribution per time step. Class
//! 0 is the CTC blank, classes `1..=n` follow the dictionary file line by
//! line, and the last class is a space.

use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::ArrayView2;
use ort::session::Session;
use ort::value::Value;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::preprocessing::preprocess_for_recognition;
use super::{build_session, first_input_name};

/// Text read from one crop
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    pub text: String,
    /// Mean probability of the emitted characters
    pub confidence: f32,
}

/// PP-OCR recognition model with its character set
#[derive(Clone)]
pub struct TextRecognizer {
    session: Arc<Mutex<Session>>,
    input_name: String,
    charset: Arc<Vec<String>>,
}

impl std::fmt::Debug for TextRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRecognizer")
            .field("input_name", &self.input_name)
            .field("charset_size", &self.charset.len())
            .finish_non_exhaustive()
    }
}

impl TextRecognizer {
    pub fn load(model_path: &Path, dict_path: &Path, accelerator: bool) -> Result<Self> {
        let charset = load_charset(dict_path)?;
        info!(
            "Loaded recognition dictionary {} ({} classes)",
            dict_path.display(),
            charset.len()
        );

        let session = build_session(model_path, accelerator)?;
        let input_name = first_input_name(&session);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            charset: Arc::new(charset),
        })
    }

    /// Recognize one text crop
    pub fn recognize(&self, crop: &DynamicImage) -> Result<RecognizedText> {
        let input = preprocess_for_recognition(crop);
        let input_value = Value::from_array(input).context("Failed to create recognition input")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("recognition session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Recognition inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract recognition output")?;

        let (steps, classes) = match output.shape() {
            [1, t, c] | [t, c] => (*t, *c),
            other => anyhow::bail!("Unexpected recognition output shape: {:?}", other),
        };
        let probs = output
            .to_shape((steps, classes))
            .context("Failed to reshape recognition output")?;

        let decoded = ctc_greedy_decode(probs.view(), &self.charset);
        debug!("Recognized '{}' ({:.3})", decoded.text, decoded.confidence);
        Ok(decoded)
    }
}

/// Read a PaddleOCR dictionary into class labels (blank first, space last)
pub fn load_charset(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        anyhow::bail!("Recognition dictionary not found: {}", path.display());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read dictionary {}", path.display()))?;
    Ok(charset_from_lines(&content))
}

fn charset_from_lines(content: &str) -> Vec<String> {
    let mut charset = vec![String::new()];
    charset.extend(
        content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string),
    );
    charset.push(" ".to_string());
    charset
}

/// Best-path CTC decoding: argmax per step, collapse repeats, drop blanks
pub fn ctc_greedy_decode(probs: ArrayView2<f32>, charset: &[String]) -> RecognizedText {
    let mut text = String::new();
    let mut kept = 0usize;
    let mut total = 0.0f32;
    let mut previous = 0usize;

    for step in probs.rows() {
        let (index, prob) = step
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (i, p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            });

        if index != 0 && index != previous {
            if let Some(label) = charset.get(index) {
                text.push_str(label);
                total += prob;
                kept += 1;
            }
        }
        previous = index;
    }

    let confidence = if kept == 0 {
        0.0
    } else {
        (total / kept as f32).clamp(0.0, 1.0)
    };

    RecognizedText { text, confidence }
}
