// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Engine error types

use std::time::Duration;
use thiserror::Error;

/// Errors raised while creating or invoking an OCR engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration rejected before any model was touched
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Models or worker could not be brought up
    #[error("engine initialization failed: {0}")]
    Initialization(String),

    /// The engine ran and reported a failure
    #[error("{0}")]
    Recognition(String),

    /// The engine did not answer within the per-request budget
    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The worker process sent something outside the protocol or went away
    #[error("worker protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Wrap an `anyhow` chain from the model loaders
    pub fn init(err: anyhow::Error) -> Self {
        EngineError::Initialization(format!("{:#}", err))
    }

    /// Wrap an `anyhow` chain from an inference call
    pub fn recognition(err: anyhow::Error) -> Self {
        EngineError::Recognition(format!("{:#}", err))
    }
}
