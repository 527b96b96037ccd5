//! tests/api/cluster.rs
use std::net::SocketAddr;

use iterative_mapreduce::{
    common::JobSpec,
    driver::JobSubmitter,
    error::{JobError, TaskError},
    map_reduce_apps::{COUNT, SUM, WORD_COUNT},
    worker::{RemoteWorker, WorkerClient},
};

use crate::helpers::{read_result, write_inputs, TestCluster};

#[tokio::test]
async fn workers_register_over_rpc() {
    let cluster = TestCluster::spawn(3).await;

    let workers = cluster.coordinator.workers().await.unwrap();

    assert_eq!(workers.len(), 3);
    for (_, address) in workers {
        let address: SocketAddr = address.parse().unwrap();
        let worker = RemoteWorker::connect(address, None).await.unwrap();
        assert_eq!(worker.ping("hello").await.unwrap(), "hello");
    }
}

#[tokio::test]
async fn word_count_across_remote_workers() {
    let cluster = TestCluster::spawn(2).await;
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    write_inputs(
        &input,
        &[
            ("a.txt", "the cat sat. the dog sat."),
            ("b.txt", "The cat ran"),
            ("c.txt", ""),
        ],
    );

    let descriptor = cluster
        .coordinator
        .submit_job(JobSpec::new(WORD_COUNT, SUM, &input, dir.path().join("out")))
        .await
        .unwrap();

    let result = read_result(&descriptor);
    assert_eq!(result["the"], "3");
    assert_eq!(result["cat"], "2");
    assert_eq!(result["sat"], "2");
    assert_eq!(result["dog"], "1");
    assert_eq!(result["ran"], "1");
    assert_eq!(result.len(), 5);
}

#[tokio::test]
async fn count_reducer_matches_sum_for_unit_values() {
    let cluster = TestCluster::spawn(2).await;
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    write_inputs(&input, &[("a.txt", "pride and pride"), ("b.txt", "and pride")]);

    let summed = cluster
        .coordinator
        .submit_job(JobSpec::new(WORD_COUNT, SUM, &input, dir.path().join("out")))
        .await
        .unwrap();
    let counted = cluster
        .coordinator
        .submit_job(JobSpec::new(WORD_COUNT, COUNT, &input, dir.path().join("out")))
        .await
        .unwrap();

    assert_eq!(read_result(&summed), read_result(&counted));
}

#[tokio::test]
async fn coordinator_errors_cross_the_rpc_boundary() {
    let cluster = TestCluster::spawn(0).await;
    let dir = tempfile::tempdir().unwrap();

    let err = cluster
        .coordinator
        .submit_job(JobSpec::new(WORD_COUNT, SUM, dir.path(), dir.path().join("out")))
        .await
        .unwrap_err();

    assert_eq!(err, JobError::NoWorkers);
}

#[tokio::test]
async fn registering_an_unreachable_worker_fails() {
    let cluster = TestCluster::spawn(0).await;
    // Bind then drop to get a port nobody listens on.
    let address = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let err = cluster.coordinator.register_worker(address).await.unwrap_err();

    assert!(matches!(err, JobError::Registration(_)));
    assert!(cluster.coordinator.workers().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_worker_is_a_transport_error() {
    let address = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let err = RemoteWorker::connect(address, None).await.err().unwrap();

    assert!(matches!(err, TaskError::Transport(_)));
}
