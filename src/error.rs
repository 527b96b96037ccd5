use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Failure raised inside a worker while running a mapper. Crosses the RPC
/// boundary, so it carries strings rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum WorkerError {
    #[error("unknown mapper `{0}`")]
    UnknownMapper(String),
    #[error("mapper `{mapper}` failed: {reason}")]
    MapFailed { mapper: String, reason: String },
}

/// Terminal failure of one mapper task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("worker unreachable: {0}")]
    Transport(String),
    #[error(transparent)]
    Application(#[from] WorkerError),
    #[error("failed to read input {path:?}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("task timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<tarpc::client::RpcError> for TaskError {
    fn from(e: tarpc::client::RpcError) -> Self {
        TaskError::Transport(e.to_string())
    }
}

/// Failure of a whole job submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum JobError {
    #[error("no workers are registered")]
    NoWorkers,
    #[error("cannot read input directory {path}: {reason}")]
    InputDir { path: String, reason: String },
    #[error("unknown reducer `{0}`")]
    UnknownReducer(String),
    #[error("all {0} map tasks failed")]
    AllTasksFailed(usize),
    #[error("reducer failed on key `{key}`: {reason}")]
    Reduce { key: String, reason: String },
    #[error("reduce stage aborted: {0}")]
    ReduceAborted(String),
    #[error("cannot write result to {path}: {reason}")]
    Output { path: String, reason: String },
    #[error("worker registration failed: {0}")]
    Registration(String),
    #[error("coordinator unreachable: {0}")]
    Rpc(String),
}

impl From<tarpc::client::RpcError> for JobError {
    fn from(e: tarpc::client::RpcError) -> Self {
        JobError::Rpc(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("at least one iteration is required")]
    NoIterations,
    #[error("job submission failed: {0}")]
    Submission(#[from] JobError),
    #[error("no result path in descriptor `{0}`")]
    MissingResultPath(String),
    #[error("cannot read result file {path:?}: {source}")]
    ResultFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot copy result {from:?} into {to:?}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
