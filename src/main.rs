use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio::task::JoinHandle;

use iterative_mapreduce::{
    configuration::{Cli, Command, TaskSettings},
    driver::{IterationDriver, JobSubmitter},
    map_reduce_apps::AppRegistry,
    map_reduce_seq::SequentialMapReduce,
    mr_parallel::{Coordinator, CoordinatorServer, RemoteCoordinator},
    telemetry,
    worker::{RemoteWorker, WorkerClient, WorkerServer},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing("mapred")?;

    match cli.command {
        Command::Master {
            listen,
            workers,
            task,
        } => run_master(listen, workers, task).await,
        Command::Worker {
            listen,
            advertise,
            rpc,
        } => run_worker(listen, advertise, rpc.master).await,
        Command::Workers { rpc } => {
            let coordinator = RemoteCoordinator::connect(rpc.master).await?;
            for (id, address) in coordinator.workers().await? {
                println!("{id} {address}");
            }
            Ok(())
        }
        Command::Submit { rpc, job } => {
            let coordinator = RemoteCoordinator::connect(rpc.master).await?;
            let descriptor = coordinator.submit_job(job.job_spec()).await?;
            println!("{descriptor}");
            Ok(())
        }
        Command::Iterate {
            rpc,
            job,
            iteration,
        } => {
            let coordinator = RemoteCoordinator::connect(rpc.master).await?;
            let driver =
                IterationDriver::new(coordinator, iteration.convergence(), iteration.iterations);
            let outcome = driver.run(&job.job_spec()).await?;
            tracing::info!(
                iterations = outcome.iterations,
                reason = ?outcome.reason,
                "iterations finished"
            );
            println!("Final Result is: {}", outcome.descriptor);
            Ok(())
        }
        Command::Ping { worker, message } => {
            let worker = RemoteWorker::connect(worker, None).await?;
            println!("{}", worker.ping(&message).await?);
            Ok(())
        }
        Command::Local { job } => {
            let path = SequentialMapReduce::new(job.job_spec(), AppRegistry::with_defaults())
                .run()
                .await?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

async fn run_master(
    listen: SocketAddr,
    workers: Vec<SocketAddr>,
    task: TaskSettings,
) -> anyhow::Result<()> {
    let registry = Arc::new(AppRegistry::with_defaults());
    let coordinator = Arc::new(Coordinator::new(registry, task.task_timeout()));
    for address in workers {
        coordinator
            .register_remote(address)
            .await
            .with_context(|| format!("Failed to register worker {address}"))?;
    }

    let (_, handle) = CoordinatorServer::new(coordinator).start(listen).await?;
    wait_for_shutdown(handle).await
}

async fn run_worker(
    listen: SocketAddr,
    advertise: Option<SocketAddr>,
    master: SocketAddr,
) -> anyhow::Result<()> {
    let registry = Arc::new(AppRegistry::with_defaults());
    let (bound, handle) = WorkerServer::new(registry).start(listen).await?;

    let coordinator = RemoteCoordinator::connect(master).await?;
    let id = coordinator
        .register_worker(advertise.unwrap_or(bound))
        .await
        .context("Failed to register with coordinator")?;
    tracing::info!(%id, %bound, "worker registered with coordinator");

    wait_for_shutdown(handle).await
}

async fn wait_for_shutdown(handle: JoinHandle<()>) -> anyhow::Result<()> {
    tokio::select! {
        result = handle => result.context("Server task failed"),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
