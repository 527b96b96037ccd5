use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::worker::WorkerClient;

#[derive(Clone)]
pub struct WorkerHandle {
    pub id: String,
    pub address: String,
    pub client: Arc<dyn WorkerClient>,
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("address", &self.address)
            .finish()
    }
}

/// Registered workers, handed out round-robin. The cursor carries over
/// between jobs so consecutive small jobs do not all land on the first worker.
#[derive(Default)]
pub struct WorkerPool {
    workers: RwLock<Vec<WorkerHandle>>,
    cursor: AtomicUsize,
}

impl WorkerPool {
    pub fn new() -> WorkerPool {
        WorkerPool::default()
    }

    /// Adds a worker and returns the id assigned to it. An address that is
    /// already registered keeps its entry and id; `client` is dropped.
    pub fn register(&self, address: impl Into<String>, client: Arc<dyn WorkerClient>) -> String {
        let address = address.into();
        let mut workers = self.workers.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = workers.iter().find(|w| w.address == address) {
            return existing.id.clone();
        }
        let id = Uuid::new_v4().to_string();
        workers.push(WorkerHandle {
            id: id.clone(),
            address,
            client,
        });
        id
    }

    /// Id of the worker registered at `address`, if any.
    pub fn id_of(&self, address: &str) -> Option<String> {
        self.workers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|w| w.address == address)
            .map(|w| w.id.clone())
    }

    pub fn workers(&self) -> Vec<WorkerHandle> {
        self.workers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.workers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One worker per task, round-robin. `None` when no worker is registered.
    pub fn assign(&self, tasks: usize) -> Option<Vec<WorkerHandle>> {
        let workers = self.workers();
        if workers.is_empty() {
            return None;
        }
        let start = self.cursor.fetch_add(tasks, Ordering::Relaxed);
        Some(
            (0..tasks)
                .map(|i| workers[(start + i) % workers.len()].clone())
                .collect(),
        )
    }
}
