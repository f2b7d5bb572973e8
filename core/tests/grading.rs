use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use cvj_core::{
    config::Config,
    grading::{CaseSelection, CaseStatus, GradeError, GradingPool, Job, Submission, VerdictKind},
    problem::Problem,
    sandbox::{cancel_pair, CancelToken, Limits},
};

const SH_CONFIG: &str = r##"
[limits]
max_wall_time_ms = 1000
max_memory_bytes = 134217728

[[language]]
name = "sh"
pattern = "*.sh"
source_file = "main.sh"
compile = "sh -n #{sourceFile}"
run = "sh #{sourceFile}"

[[language]]
name = "cpp"
pattern = "*.cpp"
source_file = "main.cpp"
compile = "g++ -O2 -o main #{sourceFile}"
run = "./main"
"##;

fn write(dir: &Path, rel: &str, contents: &str) {
    fsutil::write_with_mkdir(dir.join(rel), contents).unwrap();
}

/// `two-sum` with a shell harness that reads `a b` and prints `sum a b`.
fn two_sum_dir(root: &Path) -> std::path::PathBuf {
    let dir = root.join("two-sum");
    write(
        &dir,
        "boilerplate-full/function.sh",
        "read a b\n##USER_CODE_HERE##\nsum \"$a\" \"$b\"\n",
    );
    write(
        &dir,
        "boilerplate-full/function.cpp",
        "#include <iostream>\n##USER_CODE_HERE##\nint main() {\n  int a, b;\n  std::cin >> a >> b;\n  std::cout << sum(a, b) << std::endl;\n}\n",
    );
    for (i, (input, output)) in [("3 4", "7"), ("10 -2", "8"), ("0 0", "0\n")]
        .iter()
        .enumerate()
    {
        write(&dir, &format!("tests/inputs/{}.txt", i), input);
        write(&dir, &format!("tests/outputs/{}.txt", i), output);
    }
    dir
}

struct Fixture {
    _root: tempfile::TempDir,
    cfg: Config,
    problem: Problem,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let problem = Problem::load(two_sum_dir(root.path())).unwrap();
    Fixture {
        _root: root,
        cfg: Config::from_toml(SH_CONFIG).unwrap(),
        problem,
    }
}

impl Fixture {
    async fn grade(&self, lang: &str, code: &str) -> cvj_core::grading::Verdict {
        self.cfg
            .grader()
            .grade(
                &Submission::new(lang, code),
                &self.problem,
                &self.cfg.limits_for(&self.problem),
                &CancelToken::never(),
            )
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn accepted() {
    let f = fixture();
    let v = f.grade("sh", "sum() { echo $(($1 + $2)); }").await;
    assert_eq!(v.kind, VerdictKind::Accepted);
    assert_eq!(v.num_passed(), 3);
    assert_eq!(v.deciding_case, None);
}

#[tokio::test]
async fn trailing_whitespace_is_forgiven() {
    let f = fixture();
    let v = f.grade("sh", "sum() { printf '%d  \\n\\n' $(($1 + $2)); }").await;
    assert_eq!(v.kind, VerdictKind::Accepted);
}

#[tokio::test]
async fn syntax_error_is_compile_error() {
    let f = fixture();
    let v = f.grade("sh", "sum() { if true; then echo 1; }").await;
    assert_eq!(v.kind, VerdictKind::CompileError);
    assert!(v.cases.is_empty());
    assert!(!v.compile_output.unwrap().is_empty());
}

#[tokio::test]
async fn tle_beats_later_wrong_answer() {
    let mut f = fixture();
    f.problem.limits.max_wall_time_ms = Some(500);
    let code = r#"sum() { if [ "$1" = 3 ]; then while :; do :; done; fi; echo 0; }"#;

    let started = Instant::now();
    let v = f.grade("sh", code).await;
    assert!(started.elapsed() < Duration::from_secs(5));

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
async fn runtime_error_keeps_going() {
    let f = fixture();
    let v = f
        .grade("sh", r#"sum() { [ "$1" = 10 ] && exit 3; echo $(($1 + $2)); }"#)
        .await;
    assert_eq!(v.kind, VerdictKind::RuntimeError);
    assert_eq!(v.deciding_case, Some(1));
    let exec = v.cases[1].execution.as_ref().unwrap();
    assert_eq!(exec.exit_code, Some(3));
    assert_eq!(v.num_passed(), 2);
}

#[tokio::test]
async fn output_past_the_capture_cap_fails() {
    let mut f = fixture();
    f.cfg.sandbox.stdout_capture_max_bytes = 1024;
    // the captured prefix alone would normalize to the expected answer
    let code = r#"sum() {
  echo $(($1 + $2))
  i=0
  while [ $i -lt 4096 ]; do echo; i=$((i + 1)); done
  echo GARBAGE
}"#;
    let v = f.grade("sh", code).await;
    assert_eq!(v.kind, VerdictKind::RuntimeError);
    assert_eq!(v.deciding_case, Some(0));
    assert_eq!(v.num_passed(), 0);
    assert!(v
        .cases
        .iter()
        .all(|c| c.status == CaseStatus::OutputLimitExceeded));
    assert!(v.cases[0].execution.as_ref().unwrap().stdout_truncated);
}

#[tokio::test]
async fn run_mode_uses_samples() {
    let f = fixture();
    let v = f
        .cfg
        .grader()
        .grade_with(
            &Submission::new("sh", "sum() { echo $(($1 + $2)); }"),
            &f.problem,
            &f.cfg.limits,
            CaseSelection::Samples(f.cfg.grading.run_sample_count),
            &CancelToken::never(),
            &cvj_core::grading::Silent,
        )
        .await
        .unwrap();
    assert_eq!(v.cases.len(), 2);
}

#[tokio::test]
async fn cancel_stops_running_case() {
    let f = fixture();
    let grader = f.cfg.grader();
    let (handle, token) = cancel_pair();
    let limits = Limits::new(Duration::from_secs(30), 64 << 20);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel();
    });

    let started = Instant::now();
    let res = grader
        .grade(
            &Submission::new("sh", "sum() { while :; do :; done; }"),
            &f.problem,
            &limits,
            &token,
        )
        .await;
    assert!(matches!(res, Err(GradeError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn pool_grades_submissions_side_by_side() {
    let f = fixture();
    let pool = GradingPool::new(f.cfg.grader(), 3);
    let problem = Arc::new(f.problem.clone());
    let codes = [
        "sum() { echo $(($1 + $2)); }",
        "sum() { echo $(($1 - $2)); }",
        "sum() { exit 1; }",
    ];
    let jobs = codes
        .iter()
        .map(|code| Job {
            submission: Submission::new("sh", *code),
            problem: Arc::clone(&problem),
            limits: f.cfg.limits,
            selection: CaseSelection::All,
        })
        .collect();

    let kinds: Vec<_> = pool
        .grade_all(jobs, &CancelToken::never())
        .await
        .into_iter()
        .map(|r| r.unwrap().kind)
        .collect();
    assert_eq!(
        kinds,
        [
            VerdictKind::Accepted,
            VerdictKind::WrongAnswer,
            VerdictKind::RuntimeError
        ]
    );
}

#[tokio::test]
#[ignore = "needs g++"]
async fn two_sum_cpp() {
    let f = fixture();
    let v = f
        .grade("cpp", "int sum(int num1, int num2) { return num1 + num2; }")
        .await;
    assert_eq!(v.kind, VerdictKind::Accepted);

    let v = f.grade("cpp", "int sum(int num1, int num2) { return num1 + num2 }").await;
    assert_eq!(v.kind, VerdictKind::CompileError);
    assert!(v.compile_output.unwrap().contains("error"));
}
