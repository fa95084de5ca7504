// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the PP-OCR ONNX models

use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Square input size of the detection model
pub const DET_INPUT_SIZE: u32 = 640;

/// ImageNet statistics used by the detection model
pub const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Recognition and classification models map pixels to [-1, 1]
pub const REC_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
pub const REC_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Recognition input height
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Recognition input width cap
pub const REC_MAX_WIDTH: u32 = 320;

/// Angle classifier input shape
pub const CLS_INPUT_HEIGHT: u32 = 48;
pub const CLS_INPUT_WIDTH: u32 = 192;

/// Gray used for letterbox padding
const PAD_GRAY: u8 = 128;

/// Geometry of a letterboxed detection input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl Letterbox {
    pub fn new(original_width: u32, original_height: u32, target: u32) -> Self {
        if original_width == 0 || original_height == 0 {
            return Self {
                scale: 1.0,
                offset_x: 0,
                offset_y: 0,
                original_width,
                original_height,
            };
        }

        let scale = (target as f32 / original_width as f32).min(target as f32 / original_height as f32);
        let new_w = ((original_width as f32 * scale).round() as u32).clamp(1, target);
        let new_h = ((original_height as f32 * scale).round() as u32).clamp(1, target);

        Self {
            scale,
            offset_x: (target - new_w) / 2,
            offset_y: (target - new_h) / 2,
            original_width,
            original_height,
        }
    }

    /// Size of the resized image inside the padded canvas
    pub fn content_size(&self) -> (u32, u32) {
        let w = (self.original_width as f32 * self.scale).round() as u32;
        let h = (self.original_height as f32 * self.scale).round() as u32;
        (w.max(1), h.max(1))
    }

    /// Map a point from model input space back into the source image
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let ox = (x - self.offset_x as f32) / self.scale;
        let oy = (y - self.offset_y as f32) / self.scale;
        (
            ox.clamp(0.0, self.original_width as f32),
            oy.clamp(0.0, self.original_height as f32),
        )
    }
}

/// Letterbox to 640x640 and normalize into an NCHW tensor
pub fn preprocess_for_detection(image: &DynamicImage) -> (Array4<f32>, Letterbox) {
    let (w, h) = image.dimensions();
    let letterbox = Letterbox::new(w, h, DET_INPUT_SIZE);

    let mut canvas = RgbImage::from_pixel(
        DET_INPUT_SIZE,
        DET_INPUT_SIZE,
        Rgb([PAD_GRAY, PAD_GRAY, PAD_GRAY]),
    );

    if w > 0 && h > 0 {
        let (new_w, new_h) = letterbox.content_size();
        let resized = image
            .resize_exact(new_w, new_h, FilterType::Triangle)
            .to_rgb8();
        image::imageops::overlay(
            &mut canvas,
            &resized,
            letterbox.offset_x as i64,
            letterbox.offset_y as i64,
        );
    }

    (to_tensor(&canvas, DET_MEAN, DET_STD), letterbox)
}

/// Resize a text crop to height 48 with its aspect ratio kept
pub fn preprocess_for_recognition(crop: &DynamicImage) -> Array4<f32> {
    let width = scaled_width(crop, REC_INPUT_HEIGHT, REC_MAX_WIDTH);
    let resized = crop
        .resize_exact(width, REC_INPUT_HEIGHT, FilterType::Triangle)
        .to_rgb8();
    to_tensor(&resized, REC_MEAN, REC_STD)
}

/// Resize a text crop into the fixed 48x192 classifier input, zero padded right
pub fn preprocess_for_classification(crop: &DynamicImage) -> Array4<f32> {
    let width = scaled_width(crop, CLS_INPUT_HEIGHT, CLS_INPUT_WIDTH);
    let resized = crop
        .resize_exact(width, CLS_INPUT_HEIGHT, FilterType::Triangle)
        .to_rgb8();

    // Padding is 0.0 after normalization
    let mut tensor = Array4::zeros((1, 3, CLS_INPUT_HEIGHT as usize, CLS_INPUT_WIDTH as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] =
                (pixel[c] as f32 / 255.0 - REC_MEAN[c]) / REC_STD[c];
        }
    }
    tensor
}

fn scaled_width(crop: &DynamicImage, target_height: u32, max_width: u32) -> u32 {
    let (w, h) = crop.dimensions();
    if h == 0 {
        return 4;
    }
    let ratio = w as f32 / h as f32;
    ((target_height as f32 * ratio).ceil() as u32).clamp(4, max_width)
}

fn to_tensor(rgb: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
    let (w, h) = rgb.dimensions();
    let mut tensor = Array4::zeros((1, 3, h as usize, w as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
        }
    }
    tensor
}
