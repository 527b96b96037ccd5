use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::{
    common::JobSpec,
    driver::Convergence,
    map_reduce_apps::{SUM, WORD_COUNT},
};

/// Every setting is read once here, with `MAPRED_*` environment fallbacks,
/// and handed to constructors from `main`.
#[derive(Parser, Debug)]
#[command(name = "mapred", version, about = "Distributed iterative map-reduce")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the coordinator and accept worker registrations.
    Master {
        #[arg(long, env = "MAPRED_LISTEN", default_value = "127.0.0.1:6666")]
        listen: SocketAddr,
        /// Workers to register at startup, in addition to those that call in.
        #[arg(long = "worker")]
        workers: Vec<SocketAddr>,
        #[command(flatten)]
        task: TaskSettings,
    },
    /// Run a worker and register it with the coordinator.
    Worker {
        #[arg(long, env = "MAPRED_WORKER_LISTEN", default_value = "127.0.0.1:0")]
        listen: SocketAddr,
        /// Address the coordinator should dial; defaults to the bound address.
        #[arg(long, env = "MAPRED_WORKER_ADVERTISE")]
        advertise: Option<SocketAddr>,
        #[command(flatten)]
        rpc: RpcSettings,
    },
    /// List the workers registered with the coordinator.
    Workers {
        #[command(flatten)]
        rpc: RpcSettings,
    },
    /// Submit one job and print its result descriptor.
    Submit {
        #[command(flatten)]
        rpc: RpcSettings,
        #[command(flatten)]
        job: JobSettings,
    },
    /// Resubmit a job until the convergence value crosses the threshold.
    Iterate {
        #[command(flatten)]
        rpc: RpcSettings,
        #[command(flatten)]
        job: JobSettings,
        #[command(flatten)]
        iteration: IterationSettings,
    },
    /// Check that a worker answers.
    Ping {
        #[arg(long)]
        worker: SocketAddr,
        #[arg(long, default_value = "ping")]
        message: String,
    },
    /// Run a job in this process without workers.
    Local {
        #[command(flatten)]
        job: JobSettings,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RpcSettings {
    /// Coordinator address.
    #[arg(long, env = "MAPRED_MASTER", default_value = "127.0.0.1:6666")]
    pub master: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct JobSettings {
    #[arg(long, env = "MAPRED_MAPPER", default_value = WORD_COUNT)]
    pub mapper: String,
    #[arg(long, env = "MAPRED_REDUCER", default_value = SUM)]
    pub reducer: String,
    #[arg(long, env = "MAPRED_INPUT_DIR")]
    pub input_dir: PathBuf,
    #[arg(long, env = "MAPRED_OUTPUT_DIR")]
    pub output_dir: PathBuf,
}

impl JobSettings {
    pub fn job_spec(&self) -> JobSpec {
        JobSpec::new(
            self.mapper.clone(),
            self.reducer.clone(),
            self.input_dir.clone(),
            self.output_dir.clone(),
        )
    }
}

#[derive(Args, Debug, Clone)]
pub struct IterationSettings {
    #[arg(long, env = "MAPRED_ITERATIONS", default_value_t = 5)]
    pub iterations: usize,
    #[arg(long, env = "MAPRED_CONVERGENCE_KEY", default_value = "pride")]
    pub convergence_key: String,
    #[arg(long, env = "MAPRED_THRESHOLD", default_value_t = 100)]
    pub threshold: i64,
}

impl IterationSettings {
    pub fn convergence(&self) -> Convergence {
        Convergence::new(self.convergence_key.clone(), self.threshold)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskSettings {
    /// Abandon a map task after this many seconds; 0 or unset waits forever.
    #[arg(long, env = "MAPRED_TASK_TIMEOUT_SECS")]
    pub task_timeout_secs: Option<u64>,
}

impl TaskSettings {
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterate_defaults() {
        let cli = Cli::try_parse_from([
            "mapred",
            "iterate",
            "--input-dir",
            "in",
            "--output-dir",
            "out",
        ])
        .unwrap();

        let Command::Iterate { rpc, job, iteration } = cli.command else {
            panic!("expected iterate");
        };
        assert_eq!(rpc.master, "127.0.0.1:6666".parse::<SocketAddr>().unwrap());
        assert_eq!(job.job_spec(), JobSpec::new(WORD_COUNT, SUM, "in", "out"));
        assert_eq!(iteration.convergence(), Convergence::new("pride", 100));
        assert_eq!(iteration.iterations, 5);
    }

    #[test]
    fn master_collects_workers_and_timeout() {
        let cli = Cli::try_parse_from([
            "mapred",
            "master",
            "--worker",
            "127.0.0.1:7001",
            "--worker",
            "127.0.0.1:7002",
            "--task-timeout-secs",
            "30",
        ])
        .unwrap();

        let Command::Master { workers, task, .. } = cli.command else {
            panic!("expected master");
        };
        assert_eq!(workers.len(), 2);
        assert_eq!(task.task_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_timeout_means_none() {
        let task = TaskSettings {
            task_timeout_secs: Some(0),
        };
        assert_eq!(task.task_timeout(), None);
        assert_eq!(TaskSettings::default().task_timeout(), None);
    }

    #[test]
    fn submit_requires_directories() {
        assert!(Cli::try_parse_from(["mapred", "submit"]).is_err());
    }
}
