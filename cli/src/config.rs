use std::path::PathBuf;

use cvj_core::config::{Config, EnvOverrides};

use crate::{cmd::GlobalArgs, util};

pub const APP_NAME: &str = "cvj";

/// `~/.config/cvj/cvj.toml` on Linux.
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(Config::FILENAME))
}

/// `--config` if given, else the first `cvj.toml` found; `CVJ_*` variables applied last.
pub fn load(args: &GlobalArgs) -> anyhow::Result<Config> {
    let cfg = match &args.config {
        Some(path) => Config::from_toml_file(path.clone())?,
        None => Config::discover(util::current_dir(), user_config_file().as_deref())?,
    };
    if let Some(path) = &cfg.source_config_file {
        log::debug!(
            "Using config {}",
            util::replace_homedir_to_tilde(path).to_string_lossy()
        );
    }
    Ok(cfg.with_env(EnvOverrides::from_env()?))
}
