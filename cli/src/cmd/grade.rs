use std::path::PathBuf;

use anyhow::Context as _;

use cvj_core::{action, grading::CaseSelection, sandbox::LimitsOverride};

use super::{GlobalArgs, SubcmdResult};
use crate::{config, util};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg()] // positional argument
    pub problem_dir: PathBuf,

    #[arg()]
    pub code_file: PathBuf,

    /// Language name from cvj.toml; guessed from the file name when omitted
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Run only the first `[grading] run_sample_count` testcases
    #[arg(short, long)]
    pub run: bool,

    /// Print the verdict as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Wall-clock limit per testcase in milliseconds
    #[arg(long, value_name = "MS")]
    pub time_limit: Option<u64>,

    /// Memory limit per testcase in MiB
    #[arg(long, value_name = "MB")]
    pub memory_limit: Option<u64>,
}

impl Args {
    fn limits_override(&self) -> anyhow::Result<LimitsOverride> {
        let max_memory_bytes = match self.memory_limit {
            Some(mb) => Some(
                mb.checked_mul(1 << 20)
                    .with_context(|| format!("--memory-limit {} MB is too large", mb))?,
            ),
            None => None,
        };
        Ok(LimitsOverride {
            max_wall_time_ms: self.time_limit,
            max_memory_bytes,
        })
    }
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = config::load(global_args)?;
    let problem = action::load_problem(&args.problem_dir)?;
    let lang = action::resolve_language(&cfg, args.lang.as_deref(), &args.code_file)?;
    let submission = action::read_submission(lang, &args.code_file)?;

    let limits = cfg.limits_for(&problem).with_override(&args.limits_override()?);
    let selection = if args.run {
        CaseSelection::Samples(cfg.grading.run_sample_count)
    } else {
        CaseSelection::All
    };

    let cancel = util::cancel_on_ctrl_c();
    let verdict = action::do_grade(
        &cfg,
        &problem,
        &submission,
        &limits,
        selection,
        &cancel,
        args.json,
    )
    .await?;

    if args.json {
        println!(
            "{}",
            action::report_json(&problem, &submission, &limits, &verdict)?
        );
    }
    Ok(())
}
