use std::io;

use nix::{
    libc::rlim_t,
    sched::{unshare, CloneFlags},
    sys::resource::{setrlimit, Resource},
    unistd::setsid,
};

use super::{Limits, SandboxSettings};

/// Everything the child applies to itself between fork and exec.
///
/// Only plain values are captured: the closure runs in the forked child where
/// allocation and locking are off limits.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PreExecPlan {
    cpu_seconds: u64,
    open_files: Option<u64>,
    file_size_bytes: Option<u64>,
    address_space_bytes: Option<u64>,
    isolate_network: bool,
    strict: bool,
}

impl PreExecPlan {
    pub fn new(settings: &SandboxSettings, limits: &Limits) -> Self {
        Self {
            cpu_seconds: limits.cpu_seconds_backstop(),
            open_files: settings.max_open_files,
            file_size_bytes: settings.max_file_size_bytes,
            address_space_bytes: settings
                .limit_address_space
                .then_some(limits.max_memory_bytes),
            isolate_network: settings.isolate_network,
            strict: settings.strict,
        }
    }

    pub fn apply(&self) -> io::Result<()> {
        // own session => own process group, so the whole tree can be killed at once
        setsid()?;

        self.limit(Resource::RLIMIT_CORE, Some(0))?;
        self.limit(Resource::RLIMIT_CPU, Some(self.cpu_seconds))?;
        self.limit(Resource::RLIMIT_NOFILE, self.open_files)?;
        self.limit(Resource::RLIMIT_FSIZE, self.file_size_bytes)?;
        self.limit(Resource::RLIMIT_AS, self.address_space_bytes)?;

        if self.isolate_network {
            let res = unshare(CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNET);
            if let Err(errno) = res {
                if self.strict {
                    return Err(errno.into());
                }
            }
        }
        Ok(())
    }

    fn limit(&self, resource: Resource, value: Option<u64>) -> io::Result<()> {
        let Some(value) = value else {
            return Ok(())
        };
        match setrlimit(resource, value as rlim_t, value as rlim_t) {
            Ok(()) => Ok(()),
            Err(errno) if self.strict => Err(errno.into()),
            Err(_) => Ok(()),
        }
    }
}
