use std::sync::Arc;

use tokio::{sync::Semaphore, task::JoinHandle};

use super::{CaseSelection, GradeError, Grader, Silent, Submission, Verdict};
use crate::{
    problem::Problem,
    sandbox::{CancelToken, Executor, Limits},
};

#[derive(Debug, Clone)]
pub struct Job {
    pub submission: Submission,
    pub problem: Arc<Problem>,
    pub limits: Limits,
    pub selection: CaseSelection,
}

/// Grades many submissions at once, at most `concurrency` at a time.
#[derive(Debug)]
pub struct GradingPool<E> {
    grader: Arc<Grader<E>>,
    permits: Arc<Semaphore>,
}

impl<E> Clone for GradingPool<E> {
    fn clone(&self) -> Self {
        Self {
            grader: Arc::clone(&self.grader),
            permits: Arc::clone(&self.permits),
        }
    }
}

impl<E: Executor + 'static> GradingPool<E> {
    pub fn new(grader: Grader<E>, concurrency: usize) -> Self {
        Self {
            grader: Arc::new(grader),
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn grader(&self) -> &Grader<E> {
        &self.grader
    }

    pub fn spawn(&self, job: Job, cancel: CancelToken) -> JoinHandle<Result<Verdict, GradeError>> {
        let grader = Arc::clone(&self.grader);
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _permit = tokio::select! {
                permit = permits.acquire_owned() => permit.map_err(|_| GradeError::Cancelled)?,
                _ = cancel.cancelled() => return Err(GradeError::Cancelled),
            };
            grader
                .grade_with(
                    &job.submission,
                    &job.problem,
                    &job.limits,
                    job.selection,
                    &cancel,
                    &Silent,
                )
                .await
        })
    }

    /// Results come back in the order of `jobs`.
    pub async fn grade_all(
        &self,
        jobs: Vec<Job>,
        cancel: &CancelToken,
    ) -> Vec<Result<Verdict, GradeError>> {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| self.spawn(job, cancel.clone()))
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let res = match handle.await {
                Ok(res) => res,
                Err(e) => {
                    log::error!("Grading task failed: {}", e);
                    Ok(Verdict::internal_error())
                }
            };
            results.push(res);
        }
        results
    }
}
