pub mod common;
pub mod configuration;
pub mod driver;
pub mod error;
pub mod file_manager;
pub mod job_context;
pub mod map_reduce_apps;
pub mod map_reduce_seq;
pub mod mr_parallel;
pub mod result_map;
mod rpc;
pub mod telemetry;
pub mod worker;
