// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::api::{start_server, AppState, OcrResponse};
use crate::config::{ConfigArgs, GatewayConfig};
use crate::engine::{initialize, normalize, EngineError};

/// PaddleOCR HTTP gateway
#[derive(Parser, Debug)]
#[command(name = "ocr-gateway")]
#[command(version)]
#[command(about = "HTTP gateway in front of a PaddleOCR engine", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API (default)
    Serve,

    /// Run OCR on one local image and print the JSON result
    Recognize {
        /// Path to the image
        image: PathBuf,
    },

    /// Initialize the engine and exit
    Check,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let config = GatewayConfig::from_args(&cli.config);
    config.validate().map_err(anyhow::Error::msg)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Recognize { image } => recognize(config, image).await,
        Commands::Check => check(config).await,
    }
}

async fn serve(config: GatewayConfig) -> Result<()> {
    let engine = initialize(&config.engine)
        .await
        .context("Failed to initialize OCR engine")?;
    start_server(AppState::new(engine, config)).await
}

async fn recognize(config: GatewayConfig, image: PathBuf) -> Result<()> {
    if !image.is_file() {
        anyhow::bail!("Image not found: {}", image.display());
    }

    let engine = initialize(&config.engine)
        .await
        .context("Failed to initialize OCR engine")?;

    let raw = tokio::time::timeout(config.request_timeout, engine.recognize(&image))
        .await
        .map_err(|_| EngineError::Timeout(config.request_timeout))?
        .context("OCR processing failed")?;

    let response = OcrResponse::new(normalize(raw));
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn check(config: GatewayConfig) -> Result<()> {
    let engine = initialize(&config.engine)
        .await
        .context("Failed to initialize OCR engine")?;
    info!("✅ Engine '{}' is ready", engine.name());
    println!("ok: {}", engine.name());
    Ok(())
}
