use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use async_channel::Receiver;
use async_trait::async_trait;
use futures::{future, StreamExt};
use tarpc::{
    client, context,
    server::{self, Channel},
    tokio_serde::formats::Json,
};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    common::{read_files_from_dir, reduce_all, result_descriptor, JobSpec},
    driver::JobSubmitter,
    error::JobError,
    file_manager,
    map_reduce_apps::AppRegistry,
    result_map::ResultMap,
    rpc::{rpc_context, spawn, MAX_CONNECTIONS},
    worker::{RemoteWorker, WorkerClient},
};

use super::{
    mapper_task::{MapperTask, TaskReport},
    worker_pool::WorkerPool,
};

const PING: &str = "ping";

/// Merged output of every report drained from one job's channel.
#[derive(Debug, Default)]
pub struct MergeSummary {
    pub merged: ResultMap,
    pub succeeded: usize,
    pub failed: usize,
}

/// Drains `reports` until every sender is gone. Only this function touches
/// the merged map, so completion order is the only source of nondeterminism.
pub async fn merge_reports(reports: Receiver<TaskReport>) -> MergeSummary {
    let mut summary = MergeSummary::default();
    while let Ok(report) = reports.recv().await {
        match report.outcome {
            Ok(partial) => {
                summary.merged.merge(partial);
                summary.succeeded += 1;
            }
            Err(e) => {
                tracing::error!(
                    worker = %report.worker_id,
                    file = %report.file.display(),
                    error = %e,
                    "dropping failed task from merge"
                );
                summary.failed += 1;
            }
        }
    }
    summary
}

pub struct Coordinator {
    pool: WorkerPool,
    registry: Arc<AppRegistry>,
    task_timeout: Option<Duration>,
}

impl Coordinator {
    pub fn new(registry: Arc<AppRegistry>, task_timeout: Option<Duration>) -> Self {
        Self {
            pool: WorkerPool::new(),
            registry,
            task_timeout,
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn add_worker(&self, address: impl Into<String>, client: Arc<dyn WorkerClient>) -> String {
        self.pool.register(address, client)
    }

    /// Connects to a worker, checks it answers `ping`, then adds it to the pool.
    /// A worker already registered at `address` keeps its id.
    #[tracing::instrument(name = "Register worker", skip(self))]
    pub async fn register_remote(&self, address: SocketAddr) -> Result<String, JobError> {
        if let Some(id) = self.pool.id_of(&address.to_string()) {
            tracing::info!(%id, %address, "worker already registered");
            return Ok(id);
        }
        let worker = RemoteWorker::connect(address, self.task_timeout)
            .await
            .map_err(|e| JobError::Registration(e.to_string()))?;
        let echo = worker
            .ping(PING)
            .await
            .map_err(|e| JobError::Registration(e.to_string()))?;
        if echo != PING {
            return Err(JobError::Registration(format!(
                "{address} answered ping with `{echo}`"
            )));
        }
        let id = self.add_worker(worker.address().to_string(), Arc::new(worker));
        tracing::info!(%id, %address, workers = self.pool.len(), "worker registered");
        Ok(id)
    }

    #[tracing::instrument(name = "Submit job", skip(self), fields(job_id))]
    pub async fn submit_job(&self, job: JobSpec) -> Result<String, JobError> {
        let reducer = self.registry.reducer(&job.reducer)?;
        if self.pool.is_empty() {
            return Err(JobError::NoWorkers);
        }
        let input_dir = job.input_dir.clone();
        let files = tokio::task::spawn_blocking(move || read_files_from_dir(input_dir))
            .await
            .map_err(io::Error::other)
            .and_then(|listing| listing)
            .map_err(|e| JobError::InputDir {
                path: job.input_dir.display().to_string(),
                reason: e.to_string(),
            })?;
        let workers = self.pool.assign(files.len()).ok_or(JobError::NoWorkers)?;

        let job_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("job_id", job_id.as_str());
        let dispatched = files.len();
        tracing::info!(tasks = dispatched, workers = self.pool.len(), "dispatching map tasks");

        let (tx, rx) = async_channel::unbounded();
        for ((filename, path), worker) in files.into_iter().zip(workers) {
            let task = MapperTask::new(
                path,
                filename,
                worker,
                job.mapper.clone(),
                job_id.clone(),
                self.task_timeout,
            );
            tokio::spawn(task.run_into(tx.clone()));
        }
        drop(tx);

        let summary = merge_reports(rx).await;
        // A panicked task drops its sender without reporting.
        let failed = dispatched - summary.succeeded;
        if dispatched > 0 && summary.succeeded == 0 {
            return Err(JobError::AllTasksFailed(dispatched));
        }
        if failed > 0 {
            tracing::warn!(failed, dispatched, "job result excludes failed tasks");
        }

        // Reducers are CPU bound like mappers; keep them off the RPC executor threads.
        let merged = summary.merged;
        let output = tokio::task::spawn_blocking(move || reduce_all(reducer.as_ref(), merged))
            .await
            .unwrap_or_else(|e| Err(JobError::ReduceAborted(e.to_string())))?;
        let path = file_manager::write_result(&job.output_dir, &format!("result-{job_id}.txt"), &output)
            .await
            .map_err(|e| JobError::Output {
                path: job.output_dir.display().to_string(),
                reason: e.to_string(),
            })?;

        let descriptor = result_descriptor(&job_id, &path);
        tracing::info!(keys = output.len(), %descriptor, "job complete");
        Ok(descriptor)
    }
}

#[async_trait]
impl JobSubmitter for Coordinator {
    async fn submit_job(&self, job: JobSpec) -> Result<String, JobError> {
        Coordinator::submit_job(self, job).await
    }
}

#[tarpc::service]
pub trait CoordinatorService {
    /// Adds the worker listening on `address`; returns its id.
    async fn register_worker(address: String) -> Result<String, JobError>;

    /// Registered workers as (id, address).
    async fn workers() -> Vec<(String, String)>;

    /// Runs `job` to completion and returns its result descriptor.
    async fn submit_job(job: JobSpec) -> Result<String, JobError>;
}

#[derive(Clone)]
pub struct CoordinatorServer {
    coordinator: Arc<Coordinator>,
}

impl CoordinatorServer {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Binds `address` and serves until the returned handle is aborted.
    #[tracing::instrument(name = "Start coordinator server", skip(self))]
    pub async fn start(self, address: SocketAddr) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
        let mut listener = tarpc::serde_transport::tcp::listen(address, Json::default)
            .await
            .with_context(|| format!("Failed to bind coordinator to {address}"))?;
        listener.config_mut().max_frame_length(usize::MAX);
        let local_addr = listener.local_addr();
        tracing::info!(%local_addr, "coordinator ready to accept workers");

        let handle = tokio::spawn(
            listener
                .filter_map(|r| future::ready(r.ok()))
                .map(server::BaseChannel::with_defaults)
                .map(move |channel| channel.execute(self.clone().serve()).for_each(spawn))
                .buffer_unordered(MAX_CONNECTIONS)
                .for_each(|_| async {}),
        );
        Ok((local_addr, handle))
    }
}

impl CoordinatorService for CoordinatorServer {
    async fn register_worker(self, _: context::Context, address: String) -> Result<String, JobError> {
        let address: SocketAddr = address
            .parse()
            .map_err(|e| JobError::Registration(format!("bad address `{address}`: {e}")))?;
        self.coordinator.register_remote(address).await
    }

    async fn workers(self, _: context::Context) -> Vec<(String, String)> {
        self.coordinator
            .pool()
            .workers()
            .into_iter()
            .map(|w| (w.id, w.address))
            .collect()
    }

    async fn submit_job(self, _: context::Context, job: JobSpec) -> Result<String, JobError> {
        self.coordinator.submit_job(job).await
    }
}

/// Client side of [`CoordinatorService`], used by workers and the driver.
pub struct RemoteCoordinator {
    client: CoordinatorServiceClient,
}

impl RemoteCoordinator {
    #[tracing::instrument(name = "Connect coordinator")]
    pub async fn connect(address: SocketAddr) -> anyhow::Result<Self> {
        let mut transport = tarpc::serde_transport::tcp::connect(address, Json::default);
        transport.config_mut().max_frame_length(usize::MAX);
        let client = CoordinatorServiceClient::new(
            client::Config::default(),
            transport
                .await
                .with_context(|| format!("Failed to connect to coordinator at {address}"))?,
        )
        .spawn();
        Ok(Self { client })
    }

    pub async fn register_worker(&self, address: SocketAddr) -> Result<String, JobError> {
        self.client
            .register_worker(rpc_context(None), address.to_string())
            .await?
    }

    pub async fn workers(&self) -> Result<Vec<(String, String)>, JobError> {
        Ok(self.client.workers(rpc_context(None)).await?)
    }
}

#[async_trait]
impl JobSubmitter for RemoteCoordinator {
    async fn submit_job(&self, job: JobSpec) -> Result<String, JobError> {
        self.client.submit_job(rpc_context(None), job).await?
    }
}
