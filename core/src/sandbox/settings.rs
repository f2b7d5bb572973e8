use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// `[sandbox]` section of `cvj.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxSettings {
    pub shell: PathBuf,
    /// Parent of per-submission workspaces; the system temp dir when unset.
    pub work_root: Option<PathBuf>,
    /// Between SIGTERM and SIGKILL on cancellation, and the wait for output pipes to drain.
    pub kill_grace_ms: u64,
    pub memory_poll_interval_ms: u64,
    pub stdout_capture_max_bytes: usize,
    pub stderr_capture_max_bytes: usize,
    pub max_open_files: Option<u64>,
    pub max_file_size_bytes: Option<u64>,
    /// Also cap virtual memory at the memory limit (breaks runtimes that reserve big heaps, e.g. the JVM).
    pub limit_address_space: bool,
    /// Run in fresh user+network namespaces (no network).
    pub isolate_network: bool,
    /// Fail the spawn when an isolation step can't be applied, instead of carrying on without it.
    pub strict: bool,
    /// Host variables passed through to the program, besides `PATH`.
    pub pass_env: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl SandboxSettings {
    pub const DEFAULT_SHELL: &str = "/bin/sh";
    pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    pub fn memory_poll_interval(&self) -> Duration {
        Duration::from_millis(self.memory_poll_interval_ms.max(1))
    }
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            shell: Self::DEFAULT_SHELL.into(),
            work_root: None,
            kill_grace_ms: 200,
            memory_poll_interval_ms: 20,
            stdout_capture_max_bytes: 1 << 20,
            stderr_capture_max_bytes: 64 << 10,
            max_open_files: Some(256),
            max_file_size_bytes: Some(64 << 20),
            limit_address_space: false,
            isolate_network: false,
            strict: false,
            pass_env: Vec::new(),
            env: BTreeMap::new(),
        }
    }
}
