//! tests/api/helpers.rs
use std::{
    collections::BTreeMap,
    fs,
    net::SocketAddr,
    path::Path,
    sync::{Arc, LazyLock},
};

use iterative_mapreduce::{
    common::result_path,
    map_reduce_apps::AppRegistry,
    mr_parallel::{Coordinator, CoordinatorServer, RemoteCoordinator},
    telemetry::init_tracing,
    worker::WorkerServer,
};
use tokio::task::JoinHandle;

static TRACING: LazyLock<()> = LazyLock::new(|| {
    // Only the first test to get here installs the subscriber.
    let _ = init_tracing("tests::api");
});

fn any_port() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

pub struct TestCluster {
    pub master: SocketAddr,
    pub coordinator: RemoteCoordinator,
    handles: Vec<JoinHandle<()>>,
}

impl TestCluster {
    /// Coordinator plus `workers` worker servers, each registered over RPC.
    pub async fn spawn(workers: usize) -> TestCluster {
        LazyLock::force(&TRACING);
        let registry = Arc::new(AppRegistry::with_defaults());
        let coordinator = Arc::new(Coordinator::new(registry.clone(), None));
        let (master, handle) = CoordinatorServer::new(coordinator)
            .start(any_port())
            .await
            .expect("Failed to start coordinator");
        let mut handles = vec![handle];

        let client = RemoteCoordinator::connect(master)
            .await
            .expect("Failed to connect to coordinator");
        for _ in 0..workers {
            let (address, handle) = WorkerServer::new(registry.clone())
                .start(any_port())
                .await
                .expect("Failed to start worker");
            client
                .register_worker(address)
                .await
                .expect("Failed to register worker");
            handles.push(handle);
        }

        TestCluster {
            master,
            coordinator: client,
            handles,
        }
    }
}

impl TestCluster {
    /// A fresh client connection to the coordinator.
    pub async fn client(&self) -> RemoteCoordinator {
        RemoteCoordinator::connect(self.master)
            .await
            .expect("Failed to connect to coordinator")
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

pub fn write_inputs(dir: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    for (name, contents) in files {
        fs::write(dir.join(name), contents).unwrap();
    }
}

pub fn read_result(descriptor: &str) -> BTreeMap<String, String> {
    let path = result_path(descriptor).expect("descriptor has no result path");
    fs::read_to_string(path)
        .expect("Failed to read result file")
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
