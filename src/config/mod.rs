// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Gateway configuration
//!
//! Each setting comes from its command line flag, then its `OCR_*`
//! environment variable (a `.env` file is read first by the binary), then
//! the default.

use clap::builder::BoolishValueParser;
use clap::Args;
use std::env;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{EngineBackend, EngineConfig};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub engine: EngineConfig,
    /// Upper bound on one engine call
    pub request_timeout: Duration,
    /// Largest accepted request body
    pub max_upload_bytes: usize,
    /// Where uploads are written before recognition
    pub upload_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            engine: EngineConfig::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_dir: env::temp_dir(),
        }
    }
}

impl GatewayConfig {
    /// Build the configuration from parsed flags and `OCR_*` variables
    pub fn from_args(args: &ConfigArgs) -> Self {
        Self::default().with_overrides(args)
    }

    /// Apply flag or environment values on top of the current ones
    pub fn with_overrides(mut self, args: &ConfigArgs) -> Self {
        if let Some(host) = &args.host {
            self.host = host.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(backend) = args.backend {
            self.engine.backend = backend;
        }
        if let Some(language) = &args.language {
            self.engine.language = language.clone();
        }
        if let Some(detect) = args.detect {
            self.engine.detect = detect;
        }
        if let Some(recognize) = args.recognize {
            self.engine.recognize = recognize;
        }
        if let Some(angle) = args.angle_classification {
            self.engine.angle_classification = angle;
        }
        if let Some(accelerator) = args.accelerator {
            self.engine.accelerator = accelerator;
        }
        if let Some(model_dir) = &args.model_dir {
            self.engine.model_dir = model_dir.clone();
        }
        if let Some(python) = &args.python {
            self.engine.python = python.clone();
        }
        if let Some(secs) = args.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = args.max_upload_bytes {
            self.max_upload_bytes = bytes;
        }
        if let Some(dir) = &args.upload_dir {
            self.upload_dir = dir.clone();
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout.is_zero() {
            return Err("Request timeout must be greater than 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("Max upload size must be greater than 0".to_string());
        }
        if self.engine.language.trim().is_empty() {
            return Err("Language must not be empty".to_string());
        }
        self.bind_address()?;
        Ok(())
    }

    /// Resolve `host:port`; hostnames such as `localhost` are looked up
    pub fn bind_address(&self) -> Result<SocketAddr, String> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| format!("Invalid listen address {}:{}: {}", self.host, self.port, e))?
            .next()
            .ok_or_else(|| format!("Listen host {} did not resolve", self.host))
    }
}

/// Settings read from flags, falling back to `OCR_*` environment variables
///
/// Values that fail to parse are rejected by clap instead of defaulting.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Listen host (IP address or hostname)
    #[arg(long, env = "OCR_HOST", global = true)]
    pub host: Option<String>,

    /// Listen port
    #[arg(long, short = 'p', env = "OCR_PORT", global = true)]
    pub port: Option<u16>,

    /// Engine backend
    #[arg(long, value_enum, env = "OCR_BACKEND", global = true)]
    pub backend: Option<EngineBackend>,

    /// Recognition language
    #[arg(long, env = "OCR_LANGUAGE", global = true)]
    pub language: Option<String>,

    /// Run text detection
    #[arg(long, env = "OCR_DETECT", value_parser = BoolishValueParser::new(), global = true)]
    pub detect: Option<bool>,

    /// Run text recognition
    #[arg(long, env = "OCR_RECOGNIZE", value_parser = BoolishValueParser::new(), global = true)]
    pub recognize: Option<bool>,

    /// Correct upside-down text lines
    #[arg(
        long,
        env = "OCR_ANGLE_CLASSIFICATION",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub angle_classification: Option<bool>,

    /// Request hardware acceleration
    #[arg(long, env = "OCR_ACCELERATOR", value_parser = BoolishValueParser::new(), global = true)]
    pub accelerator: Option<bool>,

    /// ONNX model directory
    #[arg(long, env = "OCR_MODEL_DIR", global = true)]
    pub model_dir: Option<PathBuf>,

    /// Python interpreter for the paddle backend
    #[arg(long, env = "OCR_PYTHON", global = true)]
    pub python: Option<String>,

    /// Per-request engine timeout in seconds
    #[arg(long, env = "OCR_REQUEST_TIMEOUT_SECS", global = true)]
    pub request_timeout_secs: Option<u64>,

    /// Largest accepted upload in bytes
    #[arg(long, env = "OCR_MAX_UPLOAD_BYTES", global = true)]
    pub max_upload_bytes: Option<usize>,

    /// Directory for temporary upload files
    #[arg(long, env = "OCR_UPLOAD_DIR", global = true)]
    pub upload_dir: Option<PathBuf>,
}
