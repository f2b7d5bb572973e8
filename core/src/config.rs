use std::path::{Path, PathBuf};
use std::result::Result as StdResult;

use anyhow::Context as _;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};

use crate::{
    grading::Grader,
    language::Language,
    problem::Problem,
    sandbox::{Limits, LimitsOverride, ProcessExecutor, SandboxSettings},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    #[serde(default)]
    pub sandbox: SandboxSettings,
    #[serde(default)]
    pub limits: Limits,
    /// Layered over [`Grader::DEFAULT_COMPILE_LIMITS`], not over `[limits]`.
    #[serde(default)]
    pub compile: LimitsOverride,
    #[serde(default)]
    pub grading: GradingSettings,
    #[serde(default)]
    pub language: Vec<Language>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradingSettings {
    /// Submissions graded at the same time by `cvj batch`.
    pub concurrency: usize,
    pub run_sample_count: usize,
}

impl Default for GradingSettings {
    fn default() -> Self {
        Self {
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            run_sample_count: 2,
        }
    }
}

/// `CVJ_SHELL`, `CVJ_WORK_ROOT` and `CVJ_CONCURRENCY`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EnvOverrides {
    pub shell: Option<PathBuf>,
    pub work_root: Option<PathBuf>,
    pub concurrency: Option<usize>,
}

impl EnvOverrides {
    pub const PREFIX: &str = "CVJ_";

    pub fn from_env() -> anyhow::Result<Self> {
        envy::prefixed(Self::PREFIX)
            .from_env::<Self>()
            .context("Invalid CVJ_* environment variable")
    }
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &str = "cvj.toml";

    pub fn example_toml() -> anyhow::Result<String> {
        let file = Asset::get(Self::FILENAME)
            .with_context(|| format!("'{}' is not embedded", Self::FILENAME))?;
        let toml = std::str::from_utf8(file.data.as_ref())
            .with_context(|| format!("Embedded '{}' is not UTF-8", Self::FILENAME))?;
        Ok(toml.to_owned())
    }

    pub fn example() -> anyhow::Result<Self> {
        Self::from_toml(&Self::example_toml()?).context("Invalid embedded config TOML")
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find config file ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> Option<PathBuf> {
        cur_dir
            .as_ref()
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
    }

    /// The first of: `cvj.toml` in `cur_dir` or its ancestors, `user_file`, the embedded example.
    pub fn discover(cur_dir: impl AsRef<Path>, user_file: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = Self::find_file_in_ancestors(cur_dir) {
            return Self::from_toml_file(path);
        }
        match user_file {
            Some(path) if path.is_file() => Self::from_toml_file(path.to_owned()),
            _ => {
                log::debug!("No {} found, using the built-in defaults", Self::FILENAME);
                Self::example()
            }
        }
    }

    pub fn with_env(mut self, env: EnvOverrides) -> Self {
        let EnvOverrides {
            shell,
            work_root,
            concurrency,
        } = env;

        if let Some(shell) = shell {
            self.sandbox.shell = shell;
        }
        if work_root.is_some() {
            self.sandbox.work_root = work_root;
        }
        if let Some(n) = concurrency {
            self.grading.concurrency = n;
        }
        self
    }

    /// Testcase limits for `problem`: `[limits]` with the problem's overrides applied.
    pub fn limits_for(&self, problem: &Problem) -> Limits {
        self.limits.with_override(&problem.limits)
    }

    pub fn grader(&self) -> Grader<ProcessExecutor> {
        let grader = Grader::new(
            ProcessExecutor::new(self.sandbox.clone()),
            self.language.clone(),
        )
        .compile_limits(self.compile_limits());
        match &self.sandbox.work_root {
            Some(dir) => grader.work_root(dir),
            None => grader,
        }
    }

    pub fn compile_limits(&self) -> Limits {
        Grader::<ProcessExecutor>::DEFAULT_COMPILE_LIMITS.with_override(&self.compile)
    }
}
