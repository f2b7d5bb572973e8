use chrono::{DateTime, Local};
use serde::Serialize;

use crate::sandbox::ExecutionResult;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString,
)]
pub enum VerdictKind {
    #[strum(serialize = "AC")]
    Accepted,
    #[strum(serialize = "WA")]
    WrongAnswer,
    #[strum(serialize = "RE")]
    RuntimeError,
    #[strum(serialize = "TLE")]
    TimeLimitExceeded,
    #[strum(serialize = "CE")]
    CompileError,
    #[strum(serialize = "IE")]
    InternalError,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString,
)]
pub enum CaseStatus {
    #[strum(serialize = "AC")]
    Passed,
    #[strum(serialize = "WA")]
    WrongAnswer,
    #[strum(serialize = "RE")]
    RuntimeError,
    #[strum(serialize = "TLE")]
    TimeLimitExceeded,
    #[strum(serialize = "MLE")]
    MemoryLimitExceeded,
    /// Wrote more than the sandbox captures; the tail was never seen.
    #[strum(serialize = "OLE")]
    OutputLimitExceeded,
    #[strum(serialize = "IE")]
    InternalError,
}

impl VerdictKind {
    /// Rank among failing cases; the highest one decides the verdict.
    pub fn priority(self) -> u8 {
        use VerdictKind::*;
        match self {
            Accepted => 0,
            WrongAnswer => 1,
            RuntimeError => 2,
            TimeLimitExceeded => 3,
            CompileError => 4,
            InternalError => 5,
        }
    }

    pub fn is_learner_visible(self) -> bool {
        self != VerdictKind::InternalError
    }
}

impl CaseStatus {
    pub fn passed(self) -> bool {
        self == CaseStatus::Passed
    }

    pub fn verdict_kind(self) -> VerdictKind {
        use CaseStatus::*;
        match self {
            Passed => VerdictKind::Accepted,
            WrongAnswer => VerdictKind::WrongAnswer,
            RuntimeError | MemoryLimitExceeded | OutputLimitExceeded => VerdictKind::RuntimeError,
            TimeLimitExceeded => VerdictKind::TimeLimitExceeded,
            InternalError => VerdictKind::InternalError,
        }
    }

    pub fn classify(exec: &ExecutionResult, output_matches: impl FnOnce(&str) -> bool) -> Self {
        if exec.timed_out {
            CaseStatus::TimeLimitExceeded
        } else if exec.memory_exceeded {
            CaseStatus::MemoryLimitExceeded
        } else if !exec.success() || exec.output_lost {
            CaseStatus::RuntimeError
        } else if exec.stdout_truncated {
            // only a prefix was captured, comparing it proves nothing
            CaseStatus::OutputLimitExceeded
        } else if output_matches(&exec.stdout) {
            CaseStatus::Passed
        } else {
            CaseStatus::WrongAnswer
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    pub index: usize,
    pub name: String,
    pub status: CaseStatus,
    /// `None` when the case could not be run at all.
    pub execution: Option<ExecutionResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub kind: VerdictKind,
    pub cases: Vec<CaseReport>,
    /// Index into `cases` of the case that decided `kind`.
    pub deciding_case: Option<usize>,
    pub compile_output: Option<String>,
    /// Safe to show to the learner.
    pub message: Option<String>,
    pub graded_at: DateTime<Local>,
}

impl Verdict {
    pub const INTERNAL_ERROR_MESSAGE: &str =
        "Something went wrong on our side while grading. Please try again later.";

    pub fn accepted(&self) -> bool {
        self.kind == VerdictKind::Accepted
    }

    /// Verdict over completed cases: Accepted iff all passed, otherwise the first case
    /// of the highest-priority failure class decides.
    pub fn from_cases(cases: Vec<CaseReport>) -> Self {
        let mut kind = VerdictKind::Accepted;
        let mut deciding_case = None;
        for (i, c) in cases.iter().enumerate() {
            let k = c.status.verdict_kind();
            if k.priority() > kind.priority() {
                kind = k;
                deciding_case = Some(i);
            }
        }
        let message = (kind == VerdictKind::InternalError)
            .then(|| Self::INTERNAL_ERROR_MESSAGE.to_owned());
        Self {
            kind,
            cases,
            deciding_case,
            compile_output: None,
            message,
            graded_at: Local::now(),
        }
    }

    pub fn compile_error(diagnostics: impl Into<String>) -> Self {
        Self {
            kind: VerdictKind::CompileError,
            cases: Vec::new(),
            deciding_case: None,
            compile_output: Some(diagnostics.into()),
            message: None,
            graded_at: Local::now(),
        }
    }

    pub fn internal_error() -> Self {
        Self {
            kind: VerdictKind::InternalError,
            cases: Vec::new(),
            deciding_case: None,
            compile_output: None,
            message: Some(Self::INTERNAL_ERROR_MESSAGE.to_owned()),
            graded_at: Local::now(),
        }
    }

    pub fn num_passed(&self) -> usize {
        self.cases.iter().filter(|c| c.status.passed()).count()
    }
}
