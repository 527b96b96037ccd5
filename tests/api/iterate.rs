//! tests/api/iterate.rs
use std::fs;

use iterative_mapreduce::{
    common::JobSpec,
    driver::{Convergence, IterationDriver, StopReason},
    map_reduce_apps::{SUM, WORD_COUNT},
};

use crate::helpers::{read_result, write_inputs, TestCluster};

#[tokio::test]
async fn feedback_loop_converges_over_rpc() {
    let cluster = TestCluster::spawn(2).await;
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    write_inputs(&input, &[("book.txt", "pride pride pride and prejudice")]);
    let job = JobSpec::new(WORD_COUNT, SUM, &input, dir.path().join("out"));

    // Each round feeds `pride=<n>` back in, adding one more occurrence.
    let driver = IterationDriver::new(cluster.client().await, Convergence::new("pride", 3), 10);
    let outcome = driver.run(&job).await.unwrap();

    assert_eq!(outcome.reason, StopReason::Converged);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(read_result(&outcome.descriptor)["pride"], "4");
    assert_eq!(fs::read_dir(&input).unwrap().count(), 2);
}

#[tokio::test]
async fn feedback_loop_stops_at_iteration_budget() {
    let cluster = TestCluster::spawn(1).await;
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    write_inputs(&input, &[("book.txt", "sense and sensibility")]);
    let job = JobSpec::new(WORD_COUNT, SUM, &input, dir.path().join("out"));

    let driver = IterationDriver::new(cluster.client().await, Convergence::new("pride", 10), 3);
    let outcome = driver.run(&job).await.unwrap();

    assert_eq!(outcome.reason, StopReason::IterationsExhausted);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(fs::read_dir(&input).unwrap().count(), 3);
}
