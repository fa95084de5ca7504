// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR worker process backend
//!
//! One Python process is started at initialization and kept for the life of
//! the gateway. Requests and replies are JSON lines tagged with a request id:
//!
//! ```text
//! -> {"id": "<uuid>", "image": "/tmp/.tmpXXXX.png"}
//! <- {"id": "<uuid>", "result": <PaddleOCR output as JSON>}
//! <- {"id": "<uuid>", "error": "message"}
//! ```

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::EngineConfig;
use super::error::EngineError;
use super::raw_result::RawResult;
use super::OcrEngine;

const WORKER_SCRIPT: &str = include_str!("paddle_worker.py");

/// Model download and first load can be slow
const STARTUP_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Serialize)]
struct WorkerSettings<'a> {
    language: &'a str,
    detect: bool,
    recognize: bool,
    angle_classification: bool,
    accelerator: bool,
}

impl<'a> From<&'a EngineConfig> for WorkerSettings<'a> {
    fn from(config: &'a EngineConfig) -> Self {
        Self {
            language: &config.language,
            detect: config.detect,
            recognize: config.recognize,
            angle_classification: config.angle_classification,
            accelerator: config.accelerator,
        }
    }
}

#[derive(Debug, Serialize)]
struct WorkerRequest<'a> {
    id: &'a str,
    image: &'a str,
}

/// Any line the worker writes on its protocol channel
#[derive(Debug, Deserialize)]
struct WorkerMessage {
    #[serde(default)]
    ready: Option<bool>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// How a reply line relates to the request waiting for it
#[derive(Debug)]
enum Reply {
    Mine(Result<RawResult, EngineError>),
    /// Answer to an earlier request that gave up waiting
    Stale(Option<String>),
    Noise,
}

fn classify_reply(line: &str, request_id: &str) -> Reply {
    let message: WorkerMessage = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(_) => return Reply::Noise,
    };

    if message.id.as_deref() != Some(request_id) {
        return Reply::Stale(message.id);
    }

    match (message.result, message.error) {
        (_, Some(error)) => Reply::Mine(Err(EngineError::Recognition(error))),
        (Some(result), None) => Reply::Mine(Ok(RawResult::from_json(&result))),
        (None, None) => Reply::Mine(Ok(RawResult::Empty)),
    }
}

fn parse_ready(line: &str) -> Option<Result<(), EngineError>> {
    let message: WorkerMessage = serde_json::from_str(line).ok()?;
    match message.ready? {
        true => Some(Ok(())),
        false => Some(Err(EngineError::Initialization(
            message
                .error
                .unwrap_or_else(|| "worker reported failure".to_string()),
        ))),
    }
}

struct WorkerChannel {
    stdin: FramedWrite<ChildStdin, LinesCodec>,
    stdout: FramedRead<ChildStdout, LinesCodec>,
    // Held so the process is killed with the engine
    _child: Child,
}

impl WorkerChannel {
    async fn next_line(&mut self) -> Result<String, EngineError> {
        match self.stdout.next().await {
            Some(Ok(line)) => Ok(line),
            Some(Err(e)) => Err(EngineError::Protocol(format!("failed to read worker output: {}", e))),
            None => Err(EngineError::Protocol("worker process exited".to_string())),
        }
    }
}

/// PaddleOCR running in a persistent Python process
pub struct PaddleWorkerEngine {
    channel: Mutex<WorkerChannel>,
    name: String,
}

impl PaddleWorkerEngine {
    /// Start the worker and wait until PaddleOCR has loaded
    pub async fn spawn(config: &EngineConfig) -> Result<Self, EngineError> {
        let settings = serde_json::to_string(&WorkerSettings::from(config))
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;

        info!("Starting PaddleOCR worker with {}", config.python);
        let mut child = Command::new(&config.python)
            .arg("-u")
            .arg("-c")
            .arg(WORKER_SCRIPT)
            .arg(settings)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EngineError::Initialization(format!("failed to start {}: {}", config.python, e))
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                return Err(EngineError::Initialization(
                    "worker pipes unavailable".to_string(),
                ))
            }
        };

        let pid = child.id();
        let mut channel = WorkerChannel {
            stdin: FramedWrite::new(stdin, LinesCodec::new()),
            stdout: FramedRead::new(stdout, LinesCodec::new()),
            _child: child,
        };

        tokio::time::timeout(STARTUP_TIMEOUT, wait_ready(&mut channel))
            .await
            .map_err(|_| {
                EngineError::Initialization(format!(
                    "worker not ready after {}s",
                    STARTUP_TIMEOUT.as_secs()
                ))
            })??;

        info!("✅ PaddleOCR worker ready (pid {:?})", pid);
        Ok(Self {
            channel: Mutex::new(channel),
            name: format!("paddle:{}", config.language),
        })
    }
}

async fn wait_ready(channel: &mut WorkerChannel) -> Result<(), EngineError> {
    loop {
        let line = channel.next_line().await.map_err(|e| {
            EngineError::Initialization(format!("worker exited before becoming ready ({})", e))
        })?;
        match parse_ready(&line) {
            Some(outcome) => return outcome,
            None => debug!("worker: {}", line),
        }
    }
}

#[async_trait]
impl OcrEngine for PaddleWorkerEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recognize(&self, image_path: &Path) -> Result<RawResult, EngineError> {
        let request_id = Uuid::new_v4().to_string();
        let image = image_path.to_string_lossy();
        let request = serde_json::to_string(&WorkerRequest {
            id: &request_id,
            image: &image,
        })
        .map_err(|e| EngineError::Protocol(e.to_string()))?;

        let mut channel = self.channel.lock().await;
        channel
            .stdin
            .send(request)
            .await
            .map_err(|e| EngineError::Protocol(format!("failed to write to worker: {}", e)))?;

        loop {
            let line = channel.next_line().await?;
            match classify_reply(&line, &request_id) {
                Reply::Mine(result) => return result,
                Reply::Stale(id) => warn!("Discarding stale worker reply {:?}", id),
                Reply::Noise => debug!("worker: {}", line),
            }
        }
    }
}
