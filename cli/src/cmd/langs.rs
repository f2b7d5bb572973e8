use std::io;

use colored::Colorize as _;

use super::{GlobalArgs, SubcmdResult};
use crate::config;

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(short, long)]
    pub json: bool,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = config::load(global_args)?;

    if args.json {
        serde_json::to_writer_pretty(io::stdout(), &cfg.language)?;
        println!();
        return Ok(());
    }

    for lang in &cfg.language {
        println!(
            "{} {} {}",
            lang.name.bold(),
            lang.pattern.as_str().dimmed(),
            match &lang.compile {
                Some(cmd) => format!("{} && {}", cmd, lang.run),
                None => lang.run.clone(),
            }
            .bright_black()
        );
    }
    Ok(())
}
