use std::{path::PathBuf, time::Duration};

use async_channel::Sender;

use crate::{
    error::TaskError, file_manager, job_context::JobContext, result_map::ResultMap,
};

use super::worker_pool::WorkerHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    Completed,
    Failed,
}

/// What a finished task hands back to the coordinator.
#[derive(Debug)]
pub struct TaskReport {
    pub worker_id: String,
    pub file: PathBuf,
    pub state: TaskState,
    pub outcome: Result<ResultMap, TaskError>,
}

/// One input file bound to one worker. Runs once, never retries.
pub struct MapperTask {
    file: PathBuf,
    filename: String,
    worker: WorkerHandle,
    mapper: String,
    job_id: String,
    timeout: Option<Duration>,
    state: TaskState,
}

impl MapperTask {
    pub fn new(
        file: PathBuf,
        filename: String,
        worker: WorkerHandle,
        mapper: String,
        job_id: String,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            file,
            filename,
            worker,
            mapper,
            job_id,
            timeout,
            state: TaskState::Created,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    #[tracing::instrument(
        name = "Map task",
        skip(self),
        fields(worker = %self.worker.id, file = %self.filename, job = %self.job_id)
    )]
    pub async fn run(mut self) -> TaskReport {
        self.state = TaskState::Running;

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.execute())
                .await
                .unwrap_or(Err(TaskError::TimedOut(limit))),
            None => self.execute().await,
        };

        self.state = match &outcome {
            Ok(result) => {
                tracing::info!(keys = result.len(), "map task completed");
                TaskState::Completed
            }
            Err(e) => {
                tracing::error!(error = %e, "map task failed");
                TaskState::Failed
            }
        };

        TaskReport {
            worker_id: self.worker.id,
            file: self.file,
            state: self.state,
            outcome,
        }
    }

    /// Runs the task and sends its report on `reports`.
    pub async fn run_into(self, reports: Sender<TaskReport>) {
        let report = self.run().await;
        if let Err(e) = reports.send(report).await {
            tracing::warn!(file = ?e.0.file, "coordinator stopped listening for reports");
        }
    }

    async fn execute(&self) -> Result<ResultMap, TaskError> {
        let context = JobContext::for_task(&self.filename, &self.job_id);
        let input = file_manager::read_file(&self.file)
            .await
            .map_err(|source| TaskError::Input {
                path: self.file.clone(),
                source,
            })?;
        self.worker.client.map(input, &self.mapper, context).await
    }
}
