//! Processes belonging to one run, found through procfs.
//!
//! A run is its process group plus every process carrying the run's marker variable.
//! The marker is inherited across `fork` and `exec`, so a descendant that calls `setsid`
//! or double-forks away from the group is still found.

use std::{
    fs,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use nix::{
    errno::Errno,
    sys::signal::{kill, Signal},
    unistd::Pid,
};

use super::memwatch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunMarker {
    value: String,
}

impl RunMarker {
    pub const VAR: &str = "CVJ_RUN";

    /// Unique among the runs of every grader on this host.
    pub fn next() -> Self {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        Self {
            value: format!("{}-{}", std::process::id(), SEQ.fetch_add(1, Ordering::Relaxed)),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// `environ` is the raw `/proc/<pid>/environ`: `KEY=value` entries separated by NUL.
    fn is_carried_by(&self, environ: &[u8]) -> bool {
        let entry = format!("{}={}", Self::VAR, self.value);
        environ
            .split(|&b| b == 0)
            .any(|kv| kv == entry.as_bytes())
    }
}

/// Live (non-zombie) processes in group `pgid` or carrying `marker`.
pub(crate) fn members(pgid: Pid, marker: &RunMarker) -> Vec<i32> {
    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new()
    };
    let me = std::process::id() as i32;

    entries
        .filter_map(Result::ok)
        .filter_map(|e| e.file_name().to_str().and_then(|s| s.parse::<i32>().ok()))
        .filter(|&pid| pid != me)
        .filter(|&pid| {
            let Ok(stat) = fs::read_to_string(format!("/proc/{}/stat", pid)) else {
                return false
            };
            let Some((state, pgrp)) = memwatch::parse_stat(&stat) else {
                return false
            };
            if matches!(state, 'Z' | 'X') {
                return false;
            }
            pgrp == pgid.as_raw()
                || fs::read(format!("/proc/{}/environ", pid))
                    .map(|env| marker.is_carried_by(&env))
                    .unwrap_or(false)
        })
        .collect()
}

const MAX_SWEEPS: usize = 20;
const SWEEP_PAUSE: Duration = Duration::from_millis(5);

/// SIGKILLs every member of the run, sweeping again until none is left
/// (a member may fork between the scan and the signal).
pub(crate) async fn kill_all(pgid: Pid, marker: &RunMarker) -> usize {
    let mut killed = 0;
    for _ in 0..MAX_SWEEPS {
        let pids = members(pgid, marker);
        if pids.is_empty() {
            return killed;
        }
        for pid in pids {
            match kill(Pid::from_raw(pid), Signal::SIGKILL) {
                Ok(()) => killed += 1,
                Err(Errno::ESRCH) => {}
                Err(e) => log::warn!("Failed to kill leftover process {}: {}", pid, e),
            }
        }
        tokio::time::sleep(SWEEP_PAUSE).await;
    }
    log::warn!(
        "Run {} still has live processes after {} sweeps",
        marker.value(),
        MAX_SWEEPS
    );
    killed
}
