// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PP-OCR text detection
//!
//! The detection model outputs a text probability map. Regions above the
//! pixel threshold are grouped with a flood fill, scored, grown by the DB
//! unclip distance and mapped back into source image coordinates.

use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::ArrayView2;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::preprocessing::{preprocess_for_detection, Letterbox, DET_INPUT_SIZE};
use super::{build_session, first_input_name};

/// Regions within this many pixels vertically share a text line
const LINE_TOLERANCE: f32 = 10.0;

/// Post-processing thresholds
#[derive(Debug, Clone, Copy)]
pub struct DetectionParams {
    /// Minimum probability for a pixel to count as text
    pub pixel_threshold: f32,
    /// Minimum mean probability for a region to become a box
    pub box_threshold: f32,
    /// DB unclip ratio used to grow the shrunk text kernels
    pub unclip_ratio: f32,
    /// Regions with fewer pixels are noise
    pub min_region_pixels: usize,
    /// Boxes thinner than this (source pixels) are dropped
    pub min_box_side: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            pixel_threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
            min_region_pixels: 10,
            min_box_side: 3.0,
        }
    }
}

/// Axis-aligned text box in source image pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub score: f32,
}

impl TextBox {
    /// Whole-image region, used when detection is switched off
    pub fn full_image(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            score: 1.0,
        }
    }

    /// Corners clockwise from top-left
    pub fn polygon(&self) -> Vec<[f64; 2]> {
        let (x0, y0) = (self.x as f64, self.y as f64);
        let (x1, y1) = ((self.x + self.width) as f64, (self.y + self.height) as f64);
        vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]]
    }

    /// Integer crop rectangle clipped to the image
    pub fn crop_rect(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x = self.x.max(0.0).floor() as u32;
        let y = self.y.max(0.0).floor() as u32;
        if x >= image_width || y >= image_height {
            return None;
        }
        let w = (self.width.ceil() as u32).min(image_width - x);
        let h = (self.height.ceil() as u32).min(image_height - y);
        (w > 0 && h > 0).then_some((x, y, w, h))
    }
}

/// PP-OCR detection model
#[derive(Clone)]
pub struct TextDetector {
    session: Arc<Mutex<Session>>,
    input_name: String,
    params: DetectionParams,
}

impl std::fmt::Debug for TextDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextDetector")
            .field("input_name", &self.input_name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl TextDetector {
    pub fn load(model_path: &Path, accelerator: bool) -> Result<Self> {
        let session = build_session(model_path, accelerator)?;
        let input_name = first_input_name(&session);
        debug!("Detection model input: {}", input_name);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            params: DetectionParams::default(),
        })
    }

    /// Detect text boxes, returned in reading order
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<TextBox>> {
        let (input, letterbox) = preprocess_for_detection(image);
        let input_value = Value::from_array(input).context("Failed to create detection input")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("detection session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Detection inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract detection output")?;

        let (map_h, map_w) = match output.shape() {
            [1, 1, h, w] | [1, h, w] => (*h, *w),
            other => anyhow::bail!("Unexpected detection output shape: {:?}", other),
        };
        let prob_map = output
            .to_shape((map_h, map_w))
            .context("Failed to reshape detection output")?;

        let boxes = boxes_from_probability_map(prob_map.view(), &letterbox, &self.params);
        debug!("Detected {} text regions", boxes.len());
        Ok(boxes)
    }
}

/// Turn a probability map into source-space boxes in reading order
pub fn boxes_from_probability_map(
    prob_map: ArrayView2<f32>,
    letterbox: &Letterbox,
    params: &DetectionParams,
) -> Vec<TextBox> {
    let (map_h, map_w) = prob_map.dim();
    if map_h == 0 || map_w == 0 {
        return Vec::new();
    }

    let scale_x = DET_INPUT_SIZE as f32 / map_w as f32;
    let scale_y = DET_INPUT_SIZE as f32 / map_h as f32;

    let mut visited = vec![false; map_h * map_w];
    let mut boxes = Vec::new();

    for y in 0..map_h {
        for x in 0..map_w {
            if visited[y * map_w + x] || prob_map[[y, x]] < params.pixel_threshold {
                continue;
            }

            let region = flood_fill(&prob_map, &mut visited, x, y, params.pixel_threshold);
            if region.count < params.min_region_pixels {
                continue;
            }
            let mean = region.sum / region.count as f32;
            if mean < params.box_threshold {
                continue;
            }

            // DB unclip: grow by area * ratio / perimeter
            let w = (region.max_x - region.min_x + 1) as f32;
            let h = (region.max_y - region.min_y + 1) as f32;
            let distance = (w * h) * params.unclip_ratio / (2.0 * (w + h));

            let left = (region.min_x as f32 - distance) * scale_x;
            let top = (region.min_y as f32 - distance) * scale_y;
            let right = (region.max_x as f32 + 1.0 + distance) * scale_x;
            let bottom = (region.max_y as f32 + 1.0 + distance) * scale_y;

            let (x0, y0) = letterbox.to_original(left, top);
            let (x1, y1) = letterbox.to_original(right, bottom);

            if x1 - x0 < params.min_box_side || y1 - y0 < params.min_box_side {
                continue;
            }

            boxes.push(TextBox {
                x: x0,
                y: y0,
                width: x1 - x0,
                height: y1 - y0,
                score: mean,
            });
        }
    }

    sort_reading_order(&mut boxes);
    boxes
}

/// Top-to-bottom, then left-to-right within a line
pub fn sort_reading_order(boxes: &mut [TextBox]) {
    boxes.sort_by(|a, b| {
        a.y.partial_cmp(&b.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    for i in 0..boxes.len().saturating_sub(1) {
        for j in (0..=i).rev() {
            if (boxes[j + 1].y - boxes[j].y).abs() < LINE_TOLERANCE && boxes[j + 1].x < boxes[j].x {
                boxes.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
}

struct Region {
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
    count: usize,
    sum: f32,
}

fn flood_fill(
    prob_map: &ArrayView2<f32>,
    visited: &mut [bool],
    start_x: usize,
    start_y: usize,
    threshold: f32,
) -> Region {
    let (height, width) = prob_map.dim();
    let mut region = Region {
        min_x: start_x,
        max_x: start_x,
        min_y: start_y,
        max_y: start_y,
        count: 0,
        sum: 0.0,
    };
    let mut stack = vec![(start_x, start_y)];

    while let Some((x, y)) = stack.pop() {
        let idx = y * width + x;
        if visited[idx] {
            continue;
        }
        let prob = prob_map[[y, x]];
        if prob < threshold {
            continue;
        }
        visited[idx] = true;

        region.count += 1;
        region.sum += prob;
        region.min_x = region.min_x.min(x);
        region.max_x = region.max_x.max(x);
        region.min_y = region.min_y.min(y);
        region.max_y = region.max_y.max(y);

        if x > 0 {
            stack.push((x - 1, y));
        }
        if x + 1 < width {
            stack.push((x + 1, y));
        }
        if y > 0 {
            stack.push((x, y - 1));
        }
        if y + 1 < height {
            stack.push((x, y + 1));
        }
    }

    region
}
