use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;

use crate::{
    common::{result_path, JobSpec},
    error::{DriverError, JobError},
    file_manager,
};

/// Anything that runs a job to completion and returns its result descriptor.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit_job(&self, job: JobSpec) -> Result<String, JobError>;
}

#[async_trait]
impl<T: JobSubmitter + ?Sized> JobSubmitter for Arc<T> {
    async fn submit_job(&self, job: JobSpec) -> Result<String, JobError> {
        (**self).submit_job(job).await
    }
}

/// When to stop resubmitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    pub key: String,
    pub threshold: i64,
}

impl Convergence {
    pub fn new(key: impl Into<String>, threshold: i64) -> Self {
        Self {
            key: key.into(),
            threshold,
        }
    }

    /// True once the first `key=<n>` line of `result` has `n > threshold`.
    /// A missing line or a malformed number counts as not converged.
    pub fn reached(&self, result: &str) -> bool {
        let prefix = format!("{}=", self.key);
        let Some(line) = result.lines().find(|line| line.starts_with(&prefix)) else {
            tracing::warn!(key = %self.key, "convergence key not found in result");
            return false;
        };
        match line[prefix.len()..].trim().parse::<i64>() {
            Ok(value) => {
                tracing::info!(key = %self.key, value, threshold = self.threshold, "convergence value");
                value > self.threshold
            }
            Err(e) => {
                tracing::warn!(%line, error = %e, "malformed convergence value");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Converged,
    IterationsExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationOutcome {
    pub descriptor: String,
    pub result: PathBuf,
    pub iterations: usize,
    pub reason: StopReason,
}

/// Resubmits one job, feeding each result back into the input directory,
/// until the convergence value crosses its threshold or iterations run out.
pub struct IterationDriver<S> {
    submitter: S,
    convergence: Convergence,
    max_iterations: usize,
}

impl<S: JobSubmitter> IterationDriver<S> {
    pub fn new(submitter: S, convergence: Convergence, max_iterations: usize) -> Self {
        Self {
            submitter,
            convergence,
            max_iterations,
        }
    }

    #[tracing::instrument(name = "Iterate job", skip(self), fields(max = self.max_iterations))]
    pub async fn run(&self, job: &JobSpec) -> Result<IterationOutcome, DriverError> {
        if self.max_iterations == 0 {
            return Err(DriverError::NoIterations);
        }

        let mut i = 0;
        loop {
            tracing::info!(iteration = i, "submitting job");
            let descriptor = self.submitter.submit_job(job.clone()).await?;
            let result = result_path(&descriptor)
                .ok_or_else(|| DriverError::MissingResultPath(descriptor.clone()))?;
            let contents = file_manager::read_file(&result)
                .await
                .map_err(|source| DriverError::ResultFile {
                    path: result.clone(),
                    source,
                })?;

            let reason = if self.convergence.reached(&contents) {
                tracing::info!(iteration = i, "threshold reached, stopping");
                Some(StopReason::Converged)
            } else if i + 1 == self.max_iterations {
                tracing::info!(iteration = i, "maximum number of iterations reached");
                Some(StopReason::IterationsExhausted)
            } else {
                None
            };

            if let Some(reason) = reason {
                return Ok(IterationOutcome {
                    descriptor,
                    result,
                    iterations: i + 1,
                    reason,
                });
            }

            let copied = file_manager::copy_into(&result, &job.input_dir, i)
                .await
                .map_err(|source| DriverError::Copy {
                    from: result.clone(),
                    to: job.input_dir.clone(),
                    source,
                })?;
            tracing::debug!(path = %copied.display(), "result fed back as input");
            i += 1;
        }
    }
}
