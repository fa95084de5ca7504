// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text line orientation classifier (0 vs 180 degrees)

use anyhow::{Context, Result};
use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::preprocessing::preprocess_for_classification;
use super::{build_session, first_input_name};

/// Minimum score before a crop is flipped
const ROTATE_THRESHOLD: f32 = 0.9;

#[derive(Clone)]
pub struct AngleClassifier {
    session: Arc<Mutex<Session>>,
    input_name: String,
}

impl AngleClassifier {
    pub fn load(model_path: &Path, accelerator: bool) -> Result<Self> {
        let session = build_session(model_path, accelerator)?;
        let input_name = first_input_name(&session);
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
        })
    }

    /// Returns the crop turned upright
    pub fn upright(&self, crop: DynamicImage) -> Result<DynamicImage> {
        let input = preprocess_for_classification(&crop);
        let input_value = Value::from_array(input).context("Failed to create classifier input")?;

        let probs: Vec<f32> = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow::anyhow!("classifier session lock poisoned"))?;
            let outputs = session
                .run(ort::inputs![&self.input_name => input_value])
                .context("Angle classification failed")?;
            let output = outputs[0]
                .try_extract_array::<f32>()
                .context("Failed to extract classifier output")?;
            output.iter().copied().collect()
        };

        if is_upside_down(&probs) {
            Ok(crop.rotate180())
        } else {
            Ok(crop)
        }
    }
}

/// Output is `[p(0°), p(180°)]`
fn is_upside_down(probs: &[f32]) -> bool {
    match probs {
        [upright, flipped, ..] => flipped > upright && *flipped >= ROTATE_THRESHOLD,
        _ => false,
    }
}
