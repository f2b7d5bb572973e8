use std::{path::PathBuf, sync::Arc};

use cvj_core::{action, grading::Verdict};
use serde_json::json;

use super::{GlobalArgs, SubcmdResult};
use crate::{config, util};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg()] // positional argument
    pub problem_dir: PathBuf,

    #[arg(required = true)]
    pub code_files: Vec<PathBuf>,

    /// Language of every code file; guessed per file name when omitted
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Print one JSON object per code file
    #[arg(short, long)]
    pub json: bool,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = config::load(global_args)?;
    let problem = Arc::new(action::load_problem(&args.problem_dir)?);
    let limits = cfg.limits_for(&problem);

    let submissions = args
        .code_files
        .iter()
        .map(|file| {
            let lang = action::resolve_language(&cfg, args.lang.as_deref(), file)?;
            let submission = action::read_submission(lang, file)?;
            Ok((file.clone(), submission))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let cancel = util::cancel_on_ctrl_c();
    let entries = action::do_batch(&cfg, Arc::clone(&problem), submissions, &limits, &cancel).await?;

    for entry in &entries {
        if !args.json {
            action::print_batch_entry(entry);
            continue;
        }
        let value = match &entry.result {
            Ok(verdict) => json!({
                "code_file": entry.code_file,
                "problem": problem.id,
                "verdict": verdict,
            }),
            Err(e) => json!({
                "code_file": entry.code_file,
                "problem": problem.id,
                "error": e.to_string(),
            }),
        };
        println!("{}", value);
    }

    let num_accepted = entries
        .iter()
        .filter(|e| e.result.as_ref().map_or(false, Verdict::accepted))
        .count();
    log::info!("{}/{} submissions accepted", num_accepted, entries.len());
    Ok(())
}
