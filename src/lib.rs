// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod engine;

pub use config::GatewayConfig;
pub use engine::{EngineConfig, EngineHandle, OcrEngine, RawResult, RecognitionLine};
