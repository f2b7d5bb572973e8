use std::{io, path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde::Serialize;

use super::{CancelToken, Limits};
use crate::serdable::duration_ms;

/// One isolated execution: a shell command run in `work_dir` with `stdin` as its only input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub command: String,
    pub work_dir: PathBuf,
    pub stdin: Vec<u8>,
    pub limits: Limits,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    #[serde(rename = "wall_time_ms", with = "duration_ms")]
    pub wall_time: Duration,
    pub peak_memory_bytes: Option<u64>,
    pub timed_out: bool,
    pub memory_exceeded: bool,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    /// stdout could not be read to the end (a leftover process held the pipe, or a read failed).
    pub output_lost: bool,
}

impl ExecutionResult {
    /// Exited by itself with code 0.
    pub fn success(&self) -> bool {
        !self.timed_out && !self.memory_exceeded && self.exit_code == Some(0)
    }

    pub fn terminated_by_limit(&self) -> bool {
        self.timed_out || self.memory_exceeded
    }

    /// stderr followed by stdout, the way compilers are read.
    pub fn diagnostics(&self) -> String {
        match (self.stderr.is_empty(), self.stdout.is_empty()) {
            (false, false) => format!("{}\n{}", self.stderr.trim_end(), self.stdout),
            (false, true) => self.stderr.clone(),
            (true, _) => self.stdout.clone(),
        }
    }
}

/// Failures of the platform, never of the program being run.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Failed to spawn '{shell} -c {command}': {source}")]
    Spawn {
        shell: PathBuf,
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to communicate with subprocess: {0}")]
    Io(#[source] io::Error),

    #[error("Execution cancelled")]
    Cancelled,
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        req: ExecRequest,
        cancel: &CancelToken,
    ) -> Result<ExecutionResult, SandboxError>;
}
