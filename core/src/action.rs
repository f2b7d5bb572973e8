pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use colored::Colorize;
use error::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::{
    config::Config,
    grading::{
        CaseReport, CaseSelection, GradeError, GradingPool, Job, Progress, Silent, Submission,
        Verdict, VerdictKind,
    },
    language::{Language, LanguageList},
    problem::{Problem, TestCase},
    sandbox::{CancelToken, Limits},
    style,
    template::ProgramSource,
};

pub fn init_config(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let path = dir.as_ref().join(Config::FILENAME);
    ensure!(
        !path.exists(),
        "Already exists: {}",
        path.to_string_lossy()
    );
    fsutil::write_with_mkdir(&path, Config::example_toml()?)
        .context("Failed to write example config")?;
    Ok(path)
}

pub fn load_problem(dir: impl AsRef<Path>) -> Result<Problem> {
    let dir = dir.as_ref();
    Problem::load(dir).with_context(|| format!("Failed to load problem {}", dir.to_string_lossy()))
}

/// `name` when given, otherwise the language whose pattern matches the file name.
pub fn resolve_language<'c>(
    cfg: &'c Config,
    name: Option<&str>,
    code_file: &Path,
) -> Result<&'c Language> {
    if let Some(name) = name {
        return cfg.language.find_by_name(name).with_context(|| {
            format!(
                "Unknown language '{}' (configured: {})",
                name,
                cfg.language
                    .iter()
                    .map(|l| l.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        });
    }

    let filename = code_file
        .file_name()
        .with_context(|| format!("Not a file: {}", code_file.to_string_lossy()))?
        .to_string_lossy();
    cfg.language.find_for_filename(&filename).with_context(|| {
        format!(
            "Cannot tell the language of '{}' (No entry matched glob in `language[]`, use --lang)",
            filename
        )
    })
}

pub fn read_submission(lang: &Language, code_file: &Path) -> Result<Submission> {
    let code = fsutil::read_to_string(code_file).context("Failed to read code file")?;
    Ok(Submission::new(&lang.name, code))
}

pub fn splice(problem: &Problem, lang: &Language, code: &str) -> Result<ProgramSource> {
    let template = problem.template_for(lang).with_context(|| {
        format!(
            "Problem '{}' has no template for language '{}'",
            problem.id, lang.name
        )
    })?;
    template
        .splice(code)
        .with_context(|| format!("Cannot splice into {}", template.name()))
}

/// Spinner per testcase; one more for the compile step.
struct Spinners {
    container: MultiProgress,
    style: ProgressStyle,
    current: Mutex<Option<ProgressBar>>,
}

impl Spinners {
    const TICK: Duration = Duration::from_millis(50);

    fn new() -> Self {
        let style = ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        Self {
            container: MultiProgress::new(),
            style,
            current: Mutex::new(None),
        }
    }

    fn start(&self, msg: String) {
        let bar = self
            .container
            .add(ProgressBar::new_spinner())
            .with_style(self.style.clone())
            .with_message(msg);
        bar.enable_steady_tick(Self::TICK);
        if let Ok(mut cur) = self.current.lock() {
            *cur = Some(bar);
        }
    }

    fn finish(&self, msg: String) {
        if let Some(bar) = self.current.lock().ok().and_then(|mut cur| cur.take()) {
            bar.finish_with_message(msg);
        }
    }
}

impl Progress for Spinners {
    fn compile_started(&self, lang: &Language) {
        self.start(format!("Compiling ({}) ...", lang.name));
    }

    fn compile_finished(&self, ok: bool) {
        let result = if ok { "done".green() } else { "failed".bright_red() };
        self.finish(format!("Compiling ... {}", result).cyan().to_string());
    }

    fn case_started(&self, _index: usize, case: &TestCase) {
        self.start(format!("Testcase {} ...", case.name));
    }

    fn case_finished(&self, report: &CaseReport) {
        let time = report
            .execution
            .as_ref()
            .map(|e| format!(" [{}ms]", e.wall_time.as_millis()))
            .unwrap_or_default();
        self.finish(
            format!(
                "Testcase {} ... {}{}{}",
                report.name,
                style::badge(report.status),
                style::pad_code(report.status),
                time,
            )
            .cyan()
            .to_string(),
        );
    }
}

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub problem: &'a str,
    pub language: &'a str,
    pub limits: &'a Limits,
    #[serde(flatten)]
    pub verdict: &'a Verdict,
}

pub fn report_json(
    problem: &Problem,
    submission: &Submission,
    limits: &Limits,
    verdict: &Verdict,
) -> Result<String> {
    let report = Report {
        problem: &problem.id,
        language: &submission.language,
        limits,
        verdict,
    };
    serde_json::to_string_pretty(&report).context("Failed to serialize verdict")
}

/// Grades one submission. Prints spinners and a coloured report unless `quiet`.
pub async fn do_grade(
    cfg: &Config,
    problem: &Problem,
    submission: &Submission,
    limits: &Limits,
    selection: CaseSelection,
    cancel: &CancelToken,
    quiet: bool,
) -> Result<Verdict> {
    let grader = cfg.grader();
    log::info!(
        "Grading '{}' ({}) with limits {}ms / {}MiB",
        problem.id,
        submission.language,
        limits.max_wall_time_ms,
        limits.max_memory_bytes >> 20,
    );

    let res = if quiet {
        grader
            .grade_with(submission, problem, limits, selection, cancel, &Silent)
            .await
    } else {
        let spinners = Spinners::new();
        grader
            .grade_with(submission, problem, limits, selection, cancel, &spinners)
            .await
    };
    let verdict = res.with_context(|| format!("Failed to grade '{}'", problem.id))?;

    if !quiet {
        print_verdict(problem, &verdict);
    }
    Ok(verdict)
}

pub fn print_verdict(problem: &Problem, verdict: &Verdict) {
    println!();
    if let Some(diag) = &verdict.compile_output {
        style::print_compile_output(diag);
    }
    verdict
        .cases
        .iter()
        .filter(|c| !c.status.passed())
        .filter_map(|c| problem.testcases.get(c.index).map(|t| (c, t)))
        .for_each(|(c, t)| style::print_case_detail(c, t));

    style::print_verdict_summary(verdict);
}

pub struct BatchEntry {
    pub code_file: PathBuf,
    pub result: std::result::Result<Verdict, GradeError>,
}

/// Grades every code file concurrently, `[grading] concurrency` at a time.
pub async fn do_batch(
    cfg: &Config,
    problem: Arc<Problem>,
    submissions: Vec<(PathBuf, Submission)>,
    limits: &Limits,
    cancel: &CancelToken,
) -> Result<Vec<BatchEntry>> {
    ensure!(!submissions.is_empty(), "No code file to grade");

    let pool = GradingPool::new(cfg.grader(), cfg.grading.concurrency);
    log::info!(
        "Grading {} submissions of '{}', {} at a time",
        submissions.len(),
        problem.id,
        cfg.grading.concurrency.max(1),
    );

    let (files, jobs): (Vec<_>, Vec<_>) = submissions
        .into_iter()
        .map(|(file, submission)| {
            let job = Job {
                submission,
                problem: Arc::clone(&problem),
                limits: *limits,
                selection: CaseSelection::All,
            };
            (file, job)
        })
        .unzip();

    let results = pool.grade_all(jobs, cancel).await;
    Ok(files
        .into_iter()
        .zip(results)
        .map(|(code_file, result)| BatchEntry { code_file, result })
        .collect())
}

pub fn print_batch_entry(entry: &BatchEntry) {
    let file = entry.code_file.to_string_lossy();
    match &entry.result {
        Ok(v) => println!(
            "{}{} {} [{}/{}]",
            style::badge(v.kind),
            style::pad_code(v.kind),
            file.bold(),
            v.num_passed(),
            v.cases.len(),
        ),
        Err(e) => println!("{} {} {}", style::badge(VerdictKind::InternalError), file.bold(), e),
    }
}
