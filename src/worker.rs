use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use futures::{future, StreamExt};
use tarpc::{
    client, context,
    server::{self, Channel},
    tokio_serde::formats::Json,
};
use tokio::task::JoinHandle;

use crate::{
    error::{TaskError, WorkerError},
    job_context::JobContext,
    map_reduce_apps::AppRegistry,
    result_map::ResultMap,
    rpc::{rpc_context, spawn, MAX_CONNECTIONS},
};

#[tarpc::service]
pub trait WorkerService {
    /// Runs `mapper` over `input` and returns the partial result.
    async fn map(input: String, mapper: String, job_context: JobContext) -> Result<ResultMap, WorkerError>;

    /// Echoes `message`; used to check a worker before dispatching to it.
    async fn ping(message: String) -> String;
}

/// Stateless worker: every call resolves its mapper afresh from the registry.
#[derive(Clone)]
pub struct WorkerServer {
    registry: Arc<AppRegistry>,
}

impl WorkerServer {
    pub fn new(registry: Arc<AppRegistry>) -> Self {
        Self { registry }
    }

    /// Binds `address` and serves until the returned handle is aborted.
    #[tracing::instrument(name = "Start worker server", skip(self))]
    pub async fn start(self, address: SocketAddr) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
        let mut listener = tarpc::serde_transport::tcp::listen(address, Json::default)
            .await
            .with_context(|| format!("Failed to bind worker to {address}"))?;
        listener.config_mut().max_frame_length(usize::MAX);
        let local_addr = listener.local_addr();
        tracing::info!(%local_addr, "worker listening");

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

    pub fn execute_map(
        &self,
        input: &str,
        mapper: &str,
        job_context: &JobContext,
    ) -> Result<ResultMap, WorkerError> {
        let result = self.registry.run_map(mapper, input, job_context);
        match &result {
            Ok(map) => tracing::debug!(
                mapper,
                file = job_context.filename().unwrap_or_default(),
                keys = map.len(),
                "map finished"
            ),
            Err(e) => tracing::warn!(
                mapper,
                file = job_context.filename().unwrap_or_default(),
                error = %e,
                "map failed"
            ),
        }
        result
    }
}

impl WorkerService for WorkerServer {
    async fn map(
        self,
        _: context::Context,
        input: String,
        mapper: String,
        job_context: JobContext,
    ) -> Result<ResultMap, WorkerError> {
        let server = self.clone();
        let name = mapper.clone();
        // Mappers are CPU bound; keep them off the RPC executor threads.
        tokio::task::spawn_blocking(move || server.execute_map(&input, &mapper, &job_context))
            .await
            .unwrap_or_else(|e| {
                Err(WorkerError::MapFailed {
                    mapper: name,
                    reason: e.to_string(),
                })
            })
    }

    async fn ping(self, _: context::Context, message: String) -> String {
        tracing::debug!(%message, "ping");
        message
    }
}

/// Coordinator-side handle to one worker.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    async fn map(
        &self,
        input: String,
        mapper: &str,
        job_context: JobContext,
    ) -> Result<ResultMap, TaskError>;

    async fn ping(&self, message: &str) -> Result<String, TaskError>;
}

/// A worker reached over tarpc.
pub struct RemoteWorker {
    address: SocketAddr,
    client: WorkerServiceClient,
    timeout: Option<Duration>,
}

impl RemoteWorker {
    #[tracing::instrument(name = "Connect worker", skip(timeout))]
    pub async fn connect(address: SocketAddr, timeout: Option<Duration>) -> Result<Self, TaskError> {
        let mut transport = tarpc::serde_transport::tcp::connect(address, Json::default);
        transport.config_mut().max_frame_length(usize::MAX);
        let transport = transport
            .await
            .map_err(|e| TaskError::Transport(format!("{address}: {e}")))?;
        let client = WorkerServiceClient::new(client::Config::default(), transport).spawn();
        Ok(Self {
            address,
            client,
            timeout,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

#[async_trait]
impl WorkerClient for RemoteWorker {
    async fn map(
        &self,
        input: String,
        mapper: &str,
        job_context: JobContext,
    ) -> Result<ResultMap, TaskError> {
        let result = self
            .client
            .map(rpc_context(self.timeout), input, mapper.to_string(), job_context)
            .await??;
        Ok(result)
    }

    async fn ping(&self, message: &str) -> Result<String, TaskError> {
        Ok(self
            .client
            .ping(rpc_context(self.timeout), message.to_string())
            .await?)
    }
}

/// A worker running inside the coordinator's process.
pub struct LocalWorker {
    server: WorkerServer,
}

impl LocalWorker {
    pub fn new(registry: Arc<AppRegistry>) -> Self {
        Self {
            server: WorkerServer::new(registry),
        }
    }
}

#[async_trait]
impl WorkerClient for LocalWorker {
    async fn map(
        &self,
        input: String,
        mapper: &str,
        job_context: JobContext,
    ) -> Result<ResultMap, TaskError> {
        Ok(self.server.execute_map(&input, mapper, &job_context)?)
    }

    async fn ping(&self, message: &str) -> Result<String, TaskError> {
        Ok(message.to_string())
    }
}
