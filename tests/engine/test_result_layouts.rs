// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Raw PaddleOCR output as JSON, classified and normalized into lines

use ocr_gateway::engine::{normalize, RawResult, RecognitionLine};
use serde_json::json;

fn lines_from(value: serde_json::Value) -> Vec<RecognitionLine> {
    normalize(RawResult::from_json(&value))
}

#[test]
fn test_predict_output_with_extra_keys() {
    // Trimmed OCRResult.json from PaddleOCR 3.x
    let value = json!([{
        "res": {
            "input_path": "/tmp/ocr-abc.png",
            "page_index": null,
            "model_settings": {"use_doc_preprocessor": false, "use_textline_orientation": false},
            "dt_polys": [[[12, 8], [180, 8], [180, 40], [12, 40]]],
            "text_det_params": {"thresh": 0.3, "box_thresh": 0.6, "unclip_ratio": 1.5},
            "rec_texts": ["HÓA ĐƠN BÁN HÀNG", "Tổng cộng: 150.000đ"],
            "rec_scores": [0.9912, 0.9437],
            "rec_polys": [[[12, 8], [180, 8], [180, 40], [12, 40]]]
        }
    }]);

    let lines = lines_from(value);
    assert_eq!(
        lines,
        vec![
            RecognitionLine::new("HÓA ĐƠN BÁN HÀNG", 0.9912),
            RecognitionLine::new("Tổng cộng: 150.000đ", 0.9437),
        ]
    );
}

#[test]
fn test_predict_output_without_wrapper() {
    let lines = lines_from(json!([{
        "rec_texts": ["Hello", "World"],
        "rec_scores": [0.9, 0.5]
    }]));
    assert_eq!(
        serde_json::to_value(&lines).unwrap(),
        json!([
            {"text": "Hello", "confidence": 0.9},
            {"text": "World", "confidence": 0.5}
        ])
    );
}

#[test]
fn test_ocr_output_pages_of_detections() {
    // PaddleOCR 2.x ocr(): one list of [box, [text, score]] per page
    let value = json!([[
        [[[10.0, 5.0], [90.0, 5.0], [90.0, 25.0], [10.0, 25.0]], ["Xin chào", 0.98]],
        [[[10.0, 35.0], [70.0, 35.0], [70.0, 55.0], [10.0, 55.0]], ["Việt Nam", "0.91"]]
    ]]);

    let lines = lines_from(value);
    assert_eq!(
        lines,
        vec![
            RecognitionLine::new("Xin chào", 0.98),
            RecognitionLine::new("Việt Nam", 0.91),
        ]
    );
}

#[test]
fn test_only_first_page_is_used() {
    let value = json!([
        {"rec_texts": ["page one"], "rec_scores": [0.8]},
        {"rec_texts": ["page two"], "rec_scores": [0.7]}
    ]);
    let lines = lines_from(value);
    assert_eq!(lines, vec![RecognitionLine::new("page one", 0.8)]);
}

#[test]
fn test_nothing_detected_layouts() {
    for value in [json!(null), json!([]), json!([null]), json!({}), json!([[]])] {
        assert!(lines_from(value.clone()).is_empty(), "{} should give no lines", value);
    }
}

#[test]
fn test_unknown_layouts_give_no_lines() {
    for value in [
        json!("done"),
        json!(42),
        json!([{"boxes": []}]),
        json!({"rec_texts": "Hello", "rec_scores": 0.9}),
    ] {
        assert!(lines_from(value).is_empty());
    }
}

#[test]
fn test_mismatched_arrays_use_shorter_length() {
    let lines = lines_from(json!({
        "rec_texts": ["a", "b", "c"],
        "rec_scores": [0.1, 0.2]
    }));
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], RecognitionLine::new("b", 0.2));
}

#[test]
fn test_well_formed_confidences_stay_in_range() {
    let lines = lines_from(json!([[
        [[[0, 0], [1, 0], [1, 1], [0, 1]], ["x", 0.0]],
        [[[0, 0], [1, 0], [1, 1], [0, 1]], ["y", 1.0]],
        [[[0, 0], [1, 0], [1, 1], [0, 1]], ["z", 0.4321]]
    ]]));
    assert_eq!(lines.len(), 3);
    assert!(lines
        .iter()
        .all(|line| (0.0..=1.0).contains(&line.confidence)));
}
