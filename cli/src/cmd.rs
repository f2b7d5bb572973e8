pub mod batch;
pub mod grade;
pub mod init;
pub mod langs;
pub mod splice;

use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Use this cvj.toml instead of searching for one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More logs (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    #[command(alias("g"))]
    Grade(grade::Args),

    Batch(batch::Args),
    Init(init::Args),
    Langs(langs::Args),
    Splice(splice::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Batch(args) => batch::exec(args, self).await,
            Grade(args) => grade::exec(args, self).await,
            Init(args) => init::exec(args, self),
            Langs(args) => langs::exec(args, self),
            Splice(args) => splice::exec(args, self),
        }
    }
}

#[cfg(test)]
mod test {
    use clap::{CommandFactory, Parser};

    use super::*;

    #[test]
    fn verify_cli() {
        GlobalArgs::command().debug_assert();
    }

    #[test]
    fn parse_grade() {
        let args = GlobalArgs::parse_from([
            "cvj", "-v", "grade", "problems/two-sum", "sol.cpp", "--run", "--time-limit", "500",
        ]);
        assert_eq!(args.verbose, 1);
        let Subcommand::Grade(g) = args.subcmd else {
            panic!("expected grade")
        };
        assert!(g.run);
        assert_eq!(g.time_limit, Some(500));
        assert_eq!(g.lang, None);
    }
}
