use std::path::PathBuf;

use crate::{
    language::{Language, LanguageList},
    problem::{Problem, TestCase},
    sandbox::{
        CancelToken, ExecRequest, ExecutionResult, Executor, Limits, SandboxError, Workspace,
    },
    template::TemplateError,
};

use super::verdict::{CaseReport, CaseStatus, Verdict};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Name of a configured language (case-insensitive).
    pub language: String,
    pub code: String,
}

impl Submission {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
        }
    }
}

/// Which testcases a grading run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseSelection {
    /// Every testcase (a real submission).
    #[default]
    All,
    /// The first `n` testcases (a quick "run" while editing), never fewer than one.
    Samples(usize),
}

impl CaseSelection {
    pub fn select<'p>(&self, cases: &'p [TestCase]) -> &'p [TestCase] {
        match *self {
            CaseSelection::All => cases,
            CaseSelection::Samples(n) => &cases[..n.max(1).min(cases.len())],
        }
    }
}

/// Platform faults. Anything the learner's code does ends up in a [`Verdict`] instead.
#[derive(Debug, thiserror::Error)]
pub enum GradeError {
    #[error("Unknown language '{0}'")]
    UnknownLanguage(String),

    #[error("Problem '{problem}' has no template for language '{language}'")]
    TemplateNotFound { problem: String, language: String },

    #[error("Failed to provision workspace: {0}")]
    Provision(#[source] std::io::Error),

    #[error("Grading cancelled")]
    Cancelled,
}

/// Observer of a grading run; every method defaults to doing nothing.
pub trait Progress: Send + Sync {
    fn compile_started(&self, _lang: &Language) {}
    fn compile_finished(&self, _ok: bool) {}
    fn case_started(&self, _index: usize, _case: &TestCase) {}
    fn case_finished(&self, _report: &CaseReport) {}
}

/// Reports nothing.
pub struct Silent;

impl Progress for Silent {}

#[derive(Debug, Clone)]
pub struct Grader<E> {
    executor: E,
    languages: Vec<Language>,
    work_root: Option<PathBuf>,
    compile_limits: Limits,
}

enum Compiled {
    Ready,
    Failed(String),
}

impl<E: Executor> Grader<E> {
    pub const DEFAULT_COMPILE_LIMITS: Limits = Limits {
        max_wall_time_ms: 10_000,
        max_memory_bytes: 1 << 30,
    };

    pub fn new(executor: E, languages: Vec<Language>) -> Self {
        Self {
            executor,
            languages,
            work_root: None,
            compile_limits: Self::DEFAULT_COMPILE_LIMITS,
        }
    }

    pub fn work_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_root = Some(dir.into());
        self
    }

    pub fn compile_limits(mut self, limits: Limits) -> Self {
        self.compile_limits = limits;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub async fn grade(
        &self,
        submission: &Submission,
        problem: &Problem,
        limits: &Limits,
        cancel: &CancelToken,
    ) -> Result<Verdict, GradeError> {
        self.grade_with(
            submission,
            problem,
            limits,
            CaseSelection::All,
            cancel,
            &Silent,
        )
        .await
    }

    pub async fn grade_with(
        &self,
        submission: &Submission,
        problem: &Problem,
        limits: &Limits,
        selection: CaseSelection,
        cancel: &CancelToken,
        progress: &dyn Progress,
    ) -> Result<Verdict, GradeError> {
        let lang = self
            .languages
            .find_by_name(&submission.language)
            .ok_or_else(|| GradeError::UnknownLanguage(submission.language.clone()))?;
        let template =
            problem
                .template_for(lang)
                .ok_or_else(|| GradeError::TemplateNotFound {
                    problem: problem.id.clone(),
                    language: lang.name.clone(),
                })?;

        let source = match template.splice(&submission.code) {
            Ok(src) => src,
            Err(e @ TemplateError::MalformedTemplate { .. }) => {
                log::error!("Cannot grade problem '{}': {}", problem.id, e);
                return Ok(Verdict::internal_error());
            }
            Err(e @ TemplateError::PlaceholderInCode(_)) => {
                return Ok(Verdict::compile_error(e.to_string()));
            }
        };

        let workspace = Workspace::create(self.work_root.as_deref(), &lang.source_file, &source)
            .map_err(GradeError::Provision)?;

        let run_cmd = match workspace.command(&lang.run) {
            Ok(cmd) => cmd,
            Err(e) => {
                log::error!("Invalid run command for '{}': {}", lang.name, e);
                return Ok(Verdict::internal_error());
            }
        };

        if let Some(fmt) = &lang.compile {
            progress.compile_started(lang);
            let compiled = self.compile(&workspace, fmt, cancel).await;
            progress.compile_finished(matches!(compiled, Ok(Compiled::Ready)));
            match compiled {
                Ok(Compiled::Ready) => {}
                Ok(Compiled::Failed(diagnostics)) => return Ok(Verdict::compile_error(diagnostics)),
                Err(SandboxError::Cancelled) => return Err(GradeError::Cancelled),
                Err(e) => {
                    log::error!("Compilation could not run for '{}': {:#}", problem.id, e);
                    return Ok(Verdict::internal_error());
                }
            }
        }

        let cases = selection.select(&problem.testcases);
        let mut reports = Vec::with_capacity(cases.len());

        for (index, case) in cases.iter().enumerate() {
            progress.case_started(index, case);
            let req = ExecRequest {
                command: run_cmd.clone(),
                work_dir: workspace.dir().to_owned(),
                stdin: case.input.as_bytes().to_vec(),
                limits: *limits,
            };

            let report = match self.executor.execute(req, cancel).await {
                Ok(exec) => Self::judge(index, case, exec, problem),
                Err(SandboxError::Cancelled) => return Err(GradeError::Cancelled),
                Err(e) => {
                    log::error!(
                        "Testcase '{}' of '{}' could not run: {:#}",
                        case.name,
                        problem.id,
                        e
                    );
                    CaseReport {
                        index,
                        name: case.name.clone(),
                        status: CaseStatus::InternalError,
                        execution: None,
                    }
                }
            };
            progress.case_finished(&report);
            reports.push(report);
        }

        let verdict = Verdict::from_cases(reports);
        log::info!(
            "Graded '{}' ({}): {} [{}/{} passed]",
            problem.id,
            lang.name,
            verdict.kind,
            verdict.num_passed(),
            verdict.cases.len()
        );
        Ok(verdict)
    }

    async fn compile(
        &self,
        workspace: &Workspace,
        fmt: &str,
        cancel: &CancelToken,
    ) -> Result<Compiled, SandboxError> {
        let cmd = match workspace.command(fmt) {
            Ok(cmd) => cmd,
            Err(e) => {
                return Err(SandboxError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("Invalid compile command '{}': {}", fmt, e),
                )))
            }
        };
        log::debug!("Compiling: {}", cmd);

        let req = ExecRequest {
            command: cmd,
            work_dir: workspace.dir().to_owned(),
            stdin: Vec::new(),
            limits: self.compile_limits,
        };
        let res = self.executor.execute(req, cancel).await?;
        Ok(Self::compile_outcome(&res))
    }

    fn compile_outcome(res: &ExecutionResult) -> Compiled {
        if res.timed_out {
            Compiled::Failed(format!(
                "Compilation timed out\n{}",
                res.diagnostics()
            ))
        } else if res.memory_exceeded {
            Compiled::Failed(format!(
                "Compilation exceeded the memory limit\n{}",
                res.diagnostics()
            ))
        } else if !res.success() {
            Compiled::Failed(res.diagnostics())
        } else {
            Compiled::Ready
        }
    }

    fn judge(index: usize, case: &TestCase, exec: ExecutionResult, problem: &Problem) -> CaseReport {
        let status = CaseStatus::classify(&exec, |actual| {
            problem.compare.compare(&case.expected_output, actual)
        });
        log::debug!(
            "Testcase '{}': {} [{}ms]",
            case.name,
            status,
            exec.wall_time.as_millis()
        );
        CaseReport {
            index,
            name: case.name.clone(),
            status,
            execution: Some(exec),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        grading::VerdictKind, sandbox::cancel_pair, serdable::GlobPattern, template::Template,
    };

    type Script = fn(&ExecRequest) -> Result<ExecutionResult, SandboxError>;

    /// Answers by matching on the command and the stdin of each request.
    struct Scripted {
        script: Script,
        calls: AtomicUsize,
        commands: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Executor for Scripted {
        async fn execute(
            &self,
            req: ExecRequest,
            cancel: &CancelToken,
        ) -> Result<ExecutionResult, SandboxError> {
            if cancel.is_cancelled() {
                return Err(SandboxError::Cancelled);
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.commands.lock().unwrap().push(req.command.clone());
            (self.script)(&req)
        }
    }

    impl Grader<Scripted> {
        fn calls(&self) -> usize {
            self.executor().calls.load(Ordering::SeqCst)
        }
    }

    fn cpp() -> Language {
        Language {
            name: "cpp".into(),
            pattern: GlobPattern::parse("*.cpp").unwrap(),
            source_file: "main.cpp".into(),
            compile: Some("g++ -o main #{sourceFile}".into()),
            run: "./main".into(),
        }
    }

    fn grader(script: Script) -> Grader<Scripted> {
        grader_for(cpp(), script)
    }

    fn grader_for(lang: Language, script: Script) -> Grader<Scripted> {
        let exec = Scripted {
            script,
            calls: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
        };
        Grader::new(exec, vec![lang])
    }

    fn exited(code: i32, stdout: &str) -> Result<ExecutionResult, SandboxError> {
        Ok(ExecutionResult {
            exit_code: Some(code),
            stdout: stdout.to_owned(),
            wall_time: Duration::from_millis(5),
            ..Default::default()
        })
    }

    fn timed_out() -> Result<ExecutionResult, SandboxError> {
        Ok(ExecutionResult {
            timed_out: true,
            signal: Some(9),
            wall_time: Duration::from_millis(1000),
            ..Default::default()
        })
    }

    /// `a b` on stdin, `a + b` expected.
    fn two_sum() -> Problem {
        Problem::new(
            "two-sum",
            vec![Template::new(
                "function.cpp",
                "#include <iostream>\n##USER_CODE_HERE##\nint main() {}\n",
            )],
            vec![
                TestCase::new("0", "3 4", "7"),
                TestCase::new("1", "10 -2", "8"),
                TestCase::new("2", "0 0", "0"),
            ],
        )
    }

    const LIMITS: Limits = Limits {
        max_wall_time_ms: 1000,
        max_memory_bytes: 64 << 20,
    };

    fn sum_of_input(req: &ExecRequest) -> Result<ExecutionResult, SandboxError> {
        let input = String::from_utf8_lossy(&req.stdin);
        let sum: i64 = input
            .split_whitespace()
            .map(|x| x.parse::<i64>().unwrap())
            .sum();
        exited(0, &format!("{}\n", sum))
    }

    async fn grade<E: Executor>(grader: &Grader<E>, code: &str) -> Result<Verdict, GradeError> {
        grader
            .grade(
                &Submission::new("cpp", code),
                &two_sum(),
                &LIMITS,
                &CancelToken::never(),
            )
            .await
    }

    #[tokio::test]
    async fn accepted() {
        let g = grader(|req| match req.command.as_str() {
            "./main" => sum_of_input(req),
            _ => exited(0, ""),
        });
        let v = grade(&g, "int sum(int a, int b) { return a + b; }")
            .await
            .unwrap();
        assert_eq!(v.kind, VerdictKind::Accepted);
        assert_eq!(v.cases.len(), 3);
        assert_eq!(g.calls(), 4);
        assert_eq!(
            *g.executor().commands.lock().unwrap(),
            ["g++ -o main main.cpp", "./main", "./main", "./main"]
        );
    }

    #[tokio::test]
    async fn compile_error_runs_no_case() {
        let g = grader(|req| {
            assert!(req.command.starts_with("g++"), "no testcase may run");
            Ok(ExecutionResult {
                exit_code: Some(1),
                stderr: "main.cpp:2:1: error: expected '}'\n".into(),
                ..Default::default()
            })
        });
        let v = grade(&g, "int sum(int a, int b) { return a + b;")
            .await
            .unwrap();
        assert_eq!(v.kind, VerdictKind::CompileError);
        assert!(v.cases.is_empty());
        assert!(v.compile_output.unwrap().contains("expected '}'"));
        assert_eq!(g.calls(), 1);
    }

    #[tokio::test]
    async fn compile_timeout_is_compile_error() {
        let g = grader(|_| timed_out());
        let v = grade(&g, "").await.unwrap();
        assert_eq!(v.kind, VerdictKind::CompileError);
        assert!(v
            .compile_output
            .unwrap()
            .starts_with("Compilation timed out"));
    }

    #[tokio::test]
    async fn tle_then_wa_is_tle_and_keeps_all_cases() {
        let g = grader(|req| match (req.command.as_str(), &req.stdin[..]) {
            ("./main", b"3 4") => timed_out(),
            ("./main", b"10 -2") => exited(0, "9\n"),
            ("./main", _) => sum_of_input(req),
            _ => exited(0, ""),
        });
        let v = grade(&g, "").await.unwrap();
        assert_eq!(v.kind, VerdictKind::TimeLimitExceeded);
        assert_eq!(v.deciding_case, Some(0));
        let statuses: Vec<_> = v.cases.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            [
                CaseStatus::TimeLimitExceeded,
                CaseStatus::WrongAnswer,
                CaseStatus::Passed
            ]
        );
    }

    #[tokio::test]
    async fn crash_does_not_abort_batch() {
        let g = grader(|req| match (req.command.as_str(), &req.stdin[..]) {
            ("./main", b"3 4") => exited(139, ""),
            ("./main", _) => sum_of_input(req),
            _ => exited(0, ""),
        });
        let v = grade(&g, "").await.unwrap();
        assert_eq!(v.kind, VerdictKind::RuntimeError);
        assert_eq!(v.cases.len(), 3);
        assert_eq!(v.num_passed(), 2);
    }

    #[tokio::test]
    async fn executor_fault_on_one_case_is_internal_error() {
        let g = grader(|req| match (req.command.as_str(), &req.stdin[..]) {
            ("./main", b"10 -2") => Err(SandboxError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "pipe broke",
            ))),
            ("./main", _) => sum_of_input(req),
            _ => exited(0, ""),
        });
        let v = grade(&g, "").await.unwrap();
        assert_eq!(v.kind, VerdictKind::InternalError);
        assert_eq!(v.cases.len(), 3);
        assert_eq!(v.cases[1].status, CaseStatus::InternalError);
        assert!(v.cases[1].execution.is_none());
        assert_eq!(v.cases[2].status, CaseStatus::Passed);
        assert_eq!(v.message.as_deref(), Some(Verdict::INTERNAL_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn malformed_template_is_internal_error() {
        let g = grader(|_| panic!("nothing may run"));
        let mut problem = two_sum();
        problem.templates = vec![Template::new("function.cpp", "int main() {}")];
        let v = g
            .grade(
                &Submission::new("cpp", ""),
                &problem,
                &LIMITS,
                &CancelToken::never(),
            )
            .await
            .unwrap();
        assert_eq!(v.kind, VerdictKind::InternalError);
        assert!(v.cases.is_empty());
    }

    #[tokio::test]
    async fn placeholder_in_code_is_compile_error() {
        let g = grader(|_| panic!("nothing may run"));
        let v = grade(&g, "// ##USER_CODE_HERE##").await.unwrap();
        assert_eq!(v.kind, VerdictKind::CompileError);
        assert_eq!(g.calls(), 0);
    }

    #[tokio::test]
    async fn platform_faults() {
        let mut java = cpp();
        java.pattern = GlobPattern::parse("*.java").unwrap();
        let g = grader_for(java, |_| panic!("nothing may run"));
        let res = grade(&g, "").await;
        assert!(matches!(res, Err(GradeError::TemplateNotFound { .. })));

        let res = g
            .grade(
                &Submission::new("brainfuck", ""),
                &two_sum(),
                &LIMITS,
                &CancelToken::never(),
            )
            .await;
        assert!(matches!(res, Err(GradeError::UnknownLanguage(_))));
    }

    #[tokio::test]
    async fn interpreted_language_skips_compile() {
        let mut lang = cpp();
        lang.compile = None;
        let g = grader_for(lang, sum_of_input);
        let v = grade(&g, "").await.unwrap();
        assert_eq!(v.kind, VerdictKind::Accepted);
        assert_eq!(g.calls(), 3);
    }

    #[tokio::test]
    async fn samples_only() {
        let g = grader(|req| match req.command.as_str() {
            "./main" => sum_of_input(req),
            _ => exited(0, ""),
        });
        let v = g
            .grade_with(
                &Submission::new("cpp", ""),
                &two_sum(),
                &LIMITS,
                CaseSelection::Samples(2),
                &CancelToken::never(),
                &Silent,
            )
            .await
            .unwrap();
        assert_eq!(v.cases.len(), 2);
        assert_eq!(
            CaseSelection::Samples(10).select(&two_sum().testcases).len(),
            3
        );
    }

    #[tokio::test]
    async fn zero_samples_still_runs_one_case() {
        let g = grader(|req| match req.command.as_str() {
            "./main" => exited(0, "wrong"),
            _ => exited(0, ""),
        });
        let v = g
            .grade_with(
                &Submission::new("cpp", ""),
                &two_sum(),
                &LIMITS,
                CaseSelection::Samples(0),
                &CancelToken::never(),
                &Silent,
            )
            .await
            .unwrap();
        assert_eq!(v.cases.len(), 1);
        assert_eq!(v.kind, VerdictKind::WrongAnswer);
        assert!(CaseSelection::Samples(0).select(&[]).is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let g = grader(|_| exited(0, ""));
        let (handle, token) = cancel_pair();
        handle.cancel();
        let res = g
            .grade(&Submission::new("cpp", ""), &two_sum(), &LIMITS, &token)
            .await;
        assert!(matches!(res, Err(GradeError::Cancelled)));
    }

    #[tokio::test]
    async fn progress_sees_every_case() {
        #[derive(Default)]
        struct Record(Mutex<Vec<String>>);

        impl Progress for Record {
            fn compile_started(&self, lang: &Language) {
                self.0.lock().unwrap().push(format!("compile {}", lang.name));
            }
            fn case_finished(&self, report: &CaseReport) {
                self.0
                    .lock()
                    .unwrap()
                    .push(format!("{} {}", report.name, report.status));
            }
        }

        let g = grader(|req| match req.command.as_str() {
            "./main" => exited(0, "7\n"),
            _ => exited(0, ""),
        });
        let record = Record::default();
        g.grade_with(
            &Submission::new("cpp", ""),
            &two_sum(),
            &LIMITS,
            CaseSelection::All,
            &CancelToken::never(),
            &record,
        )
        .await
        .unwrap();
        assert_eq!(
            *record.0.lock().unwrap(),
            ["compile cpp", "0 AC", "1 WA", "2 WA"]
        );
    }
}
