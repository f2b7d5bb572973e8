use std::path::PathBuf;

use cvj_core::action;

use super::{GlobalArgs, SubcmdResult};
use crate::{config, util};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg()] // positional argument
    pub problem_dir: PathBuf,

    #[arg()]
    pub code_file: PathBuf,

    #[arg(short, long)]
    pub lang: Option<String>,

    /// Write the program here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = config::load(global_args)?;
    let problem = action::load_problem(&args.problem_dir)?;
    let lang = action::resolve_language(&cfg, args.lang.as_deref(), &args.code_file)?;
    let code = fsutil::read_to_string(&args.code_file)?;
    let program = action::splice(&problem, lang, &code)?;

    match &args.output {
        Some(path) => {
            fsutil::write_with_mkdir(path, &program)?;
            log::info!(
                "Wrote {}",
                util::replace_homedir_to_tilde(path).to_string_lossy()
            );
        }
        None => print!("{}", program),
    }
    Ok(())
}
