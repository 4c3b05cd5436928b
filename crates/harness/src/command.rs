//! Renderer backed by an external program
//!
//! Each test spawns the program once. The request is written to stdin as a
//! single JSON object `{"style": ..., "params": ...}`; the program draws,
//! compares against its reference image and prints `{"ok": bool,
//! "difference": number}` on stdout.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::RenderError;
use crate::params::TestParams;
use crate::runner::{RenderOutcome, Renderer};

#[derive(Serialize)]
struct Request<'a> {
    style: &'a Value,
    params: &'a TestParams,
}

/// Runs `program args..` for every test
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<String>,
    implementation: String,
    update: bool,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            implementation: String::new(),
            update: false,
        }
    }

    /// Exported to the program as `RENDER_IMPLEMENTATION`
    pub fn implementation(mut self, implementation: impl Into<String>) -> Self {
        self.implementation = implementation.into();
        self
    }

    /// Exported to the program as `UPDATE=1` so it rewrites references
    pub fn update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(
        &self,
        style: Arc<Value>,
        params: TestParams,
    ) -> Result<RenderOutcome, RenderError> {
        let request = serde_json::to_vec(&Request {
            style: &style,
            params: &params,
        })?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env("RENDER_IMPLEMENTATION", &self.implementation)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if self.update {
            cmd.env("UPDATE", "1");
        }

        debug!("Spawning {} for {}", self.program.display(), params.id());
        let mut child = cmd.spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderError::Protocol("renderer stdin unavailable".to_string()))?;

        // Feed stdin while stdout and stderr are drained so neither side
        // blocks on a full pipe. Dropping `stdin` at the end sends EOF.
        let write = async move {
            stdin.write_all(&request).await?;
            stdin.shutdown().await
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::Failed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        match written {
            Ok(()) => {}
            // The program may answer without reading the whole request
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("{} closed stdin early for {}", self.program.display(), params.id());
            }
            Err(e) => return Err(e.into()),
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            RenderError::Protocol(format!(
                "expected {{\"ok\": bool}} on stdout: {} (got {:?})",
                e,
                String::from_utf8_lossy(&output.stdout).trim()
            ))
        })
    }
}
