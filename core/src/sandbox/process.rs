use std::{io, os::unix::process::ExitStatusExt, path::Path, process::Stdio};

use async_trait::async_trait;
use nix::{
    sys::signal::{killpg, Signal},
    unistd::Pid,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStdin, Command},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use super::{
    memwatch,
    reaper::{self, RunMarker},
    rlimit::PreExecPlan,
    CancelToken, ExecRequest, ExecutionResult, Executor, SandboxError, SandboxSettings,
};

/// Runs requests as local child processes, each in its own process group.
///
/// Every process of a run is killed before `execute` returns, including those that left the group.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    settings: SandboxSettings,
}

#[derive(Debug)]
enum Termination {
    Exited(std::process::ExitStatus),
    TimedOut,
    MemoryExceeded,
    Cancelled,
}

#[derive(Debug, Default)]
struct Captured {
    text: String,
    truncated: bool,
    /// The reader gave up before EOF.
    lost: bool,
}

impl Captured {
    fn lost() -> Self {
        Self {
            lost: true,
            ..Default::default()
        }
    }
}

impl ProcessExecutor {
    pub fn new(settings: SandboxSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SandboxSettings {
        &self.settings
    }

    fn command(&self, req: &ExecRequest, marker: &RunMarker) -> Command {
        let s = &self.settings;
        let mut cmd = Command::new(&s.shell);
        cmd.arg("-c")
            .arg(&req.command)
            .current_dir(&req.work_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env_clear();

        self.set_environment(&mut cmd, &req.work_dir);
        cmd.env(RunMarker::VAR, marker.value());

        let plan = PreExecPlan::new(s, &req.limits);
        unsafe {
            cmd.pre_exec(move || plan.apply());
        }
        cmd
    }

    fn set_environment(&self, cmd: &mut Command, work_dir: &Path) {
        let s = &self.settings;
        let path = std::env::var_os("PATH").unwrap_or_else(|| SandboxSettings::DEFAULT_PATH.into());
        cmd.env("PATH", path).env("HOME", work_dir);
        for key in &s.pass_env {
            if let Some(v) = std::env::var_os(key) {
                cmd.env(key, v);
            }
        }
        for (k, v) in &s.env {
            cmd.env(k, v);
        }
    }

    async fn wait(
        &self,
        child: &mut Child,
        pgid: Pid,
        marker: &RunMarker,
        req: &ExecRequest,
        cancel: &CancelToken,
        peak_memory: &mut Option<u64>,
    ) -> Result<Termination, SandboxError> {
        let deadline = Instant::now() + req.limits.wall_time();
        let mut ticker = tokio::time::interval(self.settings.memory_poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                status = child.wait() => {
                    return status.map(Termination::Exited).map_err(SandboxError::Io);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Ok(Termination::TimedOut);
                }
                _ = cancel.cancelled() => {
                    return Ok(Termination::Cancelled);
                }
                _ = ticker.tick() => {
                    let members = reaper::members(pgid, marker);
                    let Some(rss) = memwatch::total_rss_bytes(&members) else {
                        continue
                    };
                    *peak_memory = Some(peak_memory.map_or(rss, |p| p.max(rss)));
                    if rss > req.limits.max_memory_bytes {
                        return Ok(Termination::MemoryExceeded);
                    }
                }
            }
        }
    }

    async fn terminate_gracefully(&self, child: &mut Child, pgid: Pid, marker: &RunMarker) {
        signal_group(pgid, Signal::SIGTERM);
        let exited = tokio::time::timeout(self.settings.kill_grace(), child.wait()).await;
        if exited.is_err() {
            signal_group(pgid, Signal::SIGKILL);
            let _ = child.wait().await;
        }
        reaper::kill_all(pgid, marker).await;
    }

    async fn collect(&self, task: JoinHandle<io::Result<Captured>>) -> Captured {
        match tokio::time::timeout(self.settings.kill_grace(), task).await {
            Ok(Ok(Ok(captured))) => captured,
            Ok(Ok(Err(e))) => {
                log::warn!("Failed to read output of subprocess: {:#}", e);
                Captured::lost()
            }
            Ok(Err(e)) => {
                log::warn!("Output reader panicked: {:#}", e);
                Captured::lost()
            }
            Err(_) => {
                log::warn!("Output pipe did not close; discarding output");
                Captured::lost()
            }
        }
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(
        &self,
        req: ExecRequest,
        cancel: &CancelToken,
    ) -> Result<ExecutionResult, SandboxError> {
        if cancel.is_cancelled() {
            return Err(SandboxError::Cancelled);
        }

        let marker = RunMarker::next();
        let mut child = self
            .command(&req, &marker)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                shell: self.settings.shell.clone(),
                command: req.command.clone(),
                source,
            })?;
        let start_at = Instant::now();

        let pid = child.id().ok_or_else(|| {
            SandboxError::Io(io::Error::new(
                io::ErrorKind::Other,
                "subprocess exited before its pid was read",
            ))
        })?;
        let pgid = Pid::from_raw(pid as i32);

        let stdin_task = tokio::spawn(feed_stdin(child.stdin.take(), req.stdin.clone()));
        let stdout_task = tokio::spawn(capture(
            child.stdout.take(),
            self.settings.stdout_capture_max_bytes,
        ));
        let stderr_task = tokio::spawn(capture(
            child.stderr.take(),
            self.settings.stderr_capture_max_bytes,
        ));

        let mut peak_memory = None;
        let termination = self
            .wait(&mut child, pgid, &marker, &req, cancel, &mut peak_memory)
            .await;
        let wall_time = start_at.elapsed();

        let termination = match termination {
            Ok(t) => t,
            Err(e) => {
                signal_group(pgid, Signal::SIGKILL);
                let _ = child.wait().await;
                reaper::kill_all(pgid, &marker).await;
                return Err(e);
            }
        };

        let status = match termination {
            Termination::Exited(status) => {
                signal_group(pgid, Signal::SIGKILL);
                Some(status)
            }
            Termination::TimedOut | Termination::MemoryExceeded => {
                signal_group(pgid, Signal::SIGKILL);
                child.wait().await.ok()
            }
            Termination::Cancelled => {
                self.terminate_gracefully(&mut child, pgid, &marker).await;
                stdin_task.abort();
                stdout_task.abort();
                stderr_task.abort();
                log::debug!("Cancelled: {}", req.command);
                return Err(SandboxError::Cancelled);
            }
        };

        // leftovers that left the group
        let leftovers = reaper::kill_all(pgid, &marker).await;
        if leftovers > 0 {
            log::debug!("Killed {} leftover processes of '{}'", leftovers, req.command);
        }

        stdin_task.abort();
        let stdout = self.collect(stdout_task).await;
        let stderr = self.collect(stderr_task).await;

        let timed_out = matches!(termination, Termination::TimedOut);
        let memory_exceeded = matches!(termination, Termination::MemoryExceeded);

        let res = ExecutionResult {
            stdout: stdout.text,
            stderr: stderr.text,
            exit_code: status.and_then(|s| s.code()),
            signal: status.and_then(|s| s.signal()),
            wall_time,
            peak_memory_bytes: peak_memory,
            timed_out,
            memory_exceeded,
            stdout_truncated: stdout.truncated,
            stderr_truncated: stderr.truncated,
            output_lost: stdout.lost,
        };
        log::debug!(
            "Executed '{}': exit={:?} signal={:?} {}ms tle={} mle={}",
            req.command,
            res.exit_code,
            res.signal,
            res.wall_time.as_millis(),
            res.timed_out,
            res.memory_exceeded,
        );
        Ok(res)
    }
}

fn signal_group(pgid: Pid, sig: Signal) {
    match killpg(pgid, sig) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => log::warn!("Failed to send {} to process group {}: {}", sig, pgid, e),
    }
}

async fn feed_stdin(stdin: Option<ChildStdin>, data: Vec<u8>) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(())
    };
    match stdin.write_all(&data).await {
        // the program is free to stop reading early
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        res => res,
    }
    // dropping stdin closes the pipe (EOF for the program)
}

async fn capture<R>(reader: Option<R>, max_bytes: usize) -> io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(Captured::default())
    };
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = max_bytes.saturating_sub(buf.len());
        if n > room {
            truncated = true;
        }
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }

    Ok(Captured {
        text: String::from_utf8_lossy(&buf).into_owned(),
        truncated,
        lost: false,
    })
}
