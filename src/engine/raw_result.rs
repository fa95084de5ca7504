// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Raw engine output
//!
//! PaddleOCR has changed its result layout across releases. `RawResult`
//! names the layouts the gateway understands and keeps everything else in
//! an explicit `Unrecognized` variant instead of probing fields at the call
//! site.
//!
//! JSON layouts accepted by [`RawResult::from_json`]:
//! - `null`, `[]`, `[null]`, `{}` - nothing detected
//! - `[{"rec_texts": [...], "rec_scores": [...]}]` - `predict()` pages
//! - `[[[box, [text, score]], ...]]` - `ocr()` pages of detections
//! - `[[box, [text, score]], ...]` - a bare detection list

use serde_json::{Map, Value};
use tracing::{debug, warn};

/// One detected text region
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Polygon points of the region, in source image pixels
    pub geometry: Vec<[f64; 2]>,
    pub text: String,
    pub confidence: f64,
}

/// Engine output before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    /// Engine ran and found nothing
    Empty,
    /// Regions with geometry plus a `(text, confidence)` pair
    Detections(Vec<Detection>),
    /// Texts and scores paired by position
    ParallelArrays { texts: Vec<String>, scores: Vec<f64> },
    /// Any other layout, with a short description for logging
    Unrecognized(String),
}

impl RawResult {
    /// Classify a JSON value produced by a PaddleOCR library call
    pub fn from_json(value: &Value) -> RawResult {
        match value {
            Value::Null => RawResult::Empty,
            Value::Object(map) => classify_page_object(map),
            Value::Array(items) => {
                let Some(first) = items.first() else {
                    return RawResult::Empty;
                };

                if looks_like_detection(first) {
                    return parse_detections(items);
                }

                if items.len() > 1 {
                    debug!("OCR result holds {} pages, using the first", items.len());
                }
                classify_page(first)
            }
            other => RawResult::Unrecognized(describe(other)),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawResult::Empty => true,
            RawResult::Detections(detections) => detections.is_empty(),
            RawResult::ParallelArrays { texts, .. } => texts.is_empty(),
            RawResult::Unrecognized(_) => false,
        }
    }
}

fn classify_page(page: &Value) -> RawResult {
    match page {
        Value::Null => RawResult::Empty,
        Value::Object(map) => classify_page_object(map),
        Value::Array(entries) => match entries.first() {
            None => RawResult::Empty,
            Some(first) if looks_like_detection(first) => parse_detections(entries),
            Some(_) => RawResult::Unrecognized(format!("page {}", describe(page))),
        },
        other => RawResult::Unrecognized(format!("page {}", describe(other))),
    }
}

fn classify_page_object(map: &Map<String, Value>) -> RawResult {
    if map.is_empty() {
        return RawResult::Empty;
    }

    // `OCRResult.json` nests the payload under "res"
    if let Some(Value::Object(inner)) = map.get("res") {
        return classify_page_object(inner);
    }

    match (map.get("rec_texts"), map.get("rec_scores")) {
        (Some(texts), Some(scores)) => parse_parallel_arrays(texts, scores),
        _ => RawResult::Unrecognized(describe_object(map)),
    }
}

fn parse_parallel_arrays(texts: &Value, scores: &Value) -> RawResult {
    let (Value::Array(texts), Value::Array(scores)) = (texts, scores) else {
        return RawResult::Unrecognized("rec_texts/rec_scores are not arrays".to_string());
    };

    let mut parsed_texts = Vec::with_capacity(texts.len());
    for text in texts {
        match text.as_str() {
            Some(s) => parsed_texts.push(s.to_string()),
            None => {
                return RawResult::Unrecognized(format!(
                    "rec_texts entry is {}",
                    describe(text)
                ))
            }
        }
    }

    let mut parsed_scores = Vec::with_capacity(scores.len());
    for score in scores {
        match coerce_score(score) {
            Some(s) => parsed_scores.push(s),
            None => {
                return RawResult::Unrecognized(format!(
                    "rec_scores entry is {}",
                    describe(score)
                ))
            }
        }
    }

    RawResult::ParallelArrays {
        texts: parsed_texts,
        scores: parsed_scores,
    }
}

fn parse_detections(entries: &[Value]) -> RawResult {
    let mut detections = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let Some(parts) = entry.as_array().filter(|parts| parts.len() >= 2) else {
            warn!("Skipping malformed detection #{}: {}", index, describe(entry));
            continue;
        };

        let Some((text, confidence)) = parse_text_pair(&parts[1]) else {
            warn!(
                "Skipping detection #{} without a (text, score) pair: {}",
                index,
                describe(&parts[1])
            );
            continue;
        };

        detections.push(Detection {
            geometry: parse_geometry(&parts[0]),
            text,
            confidence,
        });
    }

    RawResult::Detections(detections)
}

/// `[box, [text, score]]` with a string in the pair's first slot
fn looks_like_detection(value: &Value) -> bool {
    value
        .as_array()
        .filter(|parts| parts.len() >= 2)
        .and_then(|parts| parts[1].as_array())
        .and_then(|pair| pair.first())
        .map(Value::is_string)
        .unwrap_or(false)
}

fn parse_text_pair(value: &Value) -> Option<(String, f64)> {
    let pair = value.as_array()?;
    if pair.len() != 2 {
        return None;
    }
    let text = pair[0].as_str()?.to_string();
    let confidence = coerce_score(&pair[1])?;
    Some((text, confidence))
}

fn parse_geometry(value: &Value) -> Vec<[f64; 2]> {
    value
        .as_array()
        .map(|points| {
            points
                .iter()
                .filter_map(|point| {
                    let xy = point.as_array()?;
                    Some([xy.first()?.as_f64()?, xy.get(1)?.as_f64()?])
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Scores arrive as JSON numbers or, from some numpy conversions, strings
pub(crate) fn coerce_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    score.is_finite().then_some(score)
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(_) => "a number".to_string(),
        Value::String(_) => "a string".to_string(),
        Value::Array(items) => format!("an array of {} items", items.len()),
        Value::Object(map) => describe_object(map),
    }
}

fn describe_object(map: &Map<String, Value>) -> String {
    let keys: Vec<&str> = map.keys().map(String::as_str).take(8).collect();
    format!("an object with keys [{}]", keys.join(", "))
}
