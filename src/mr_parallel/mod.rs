pub mod coordinator;
pub mod mapper_task;
pub mod worker_pool;

pub use coordinator::{Coordinator, CoordinatorServer, CoordinatorService, RemoteCoordinator};
pub use mapper_task::{MapperTask, TaskReport, TaskState};
pub use worker_pool::{WorkerHandle, WorkerPool};
