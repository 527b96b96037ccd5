use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{error::JobError, job_context::JobContext, result_map::ResultMap};

/// {key: reduce_output}
pub type Output = BTreeMap<String, String>;

/// One map+reduce submission over an input directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub mapper: String,
    pub reducer: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl JobSpec {
    pub fn new(
        mapper: impl Into<String>,
        reducer: impl Into<String>,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mapper: mapper.into(),
            reducer: reducer.into(),
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }
}

/// Result descriptor returned by a submission: the result path sits between
/// the first `[` and the following `]`.
pub fn result_descriptor(job_id: &str, path: &Path) -> String {
    format!("Job {} complete [{}] success", job_id, path.display())
}

pub fn result_path(descriptor: &str) -> Option<PathBuf> {
    let start = descriptor.find('[')? + 1;
    let len = descriptor[start..].find(']')?;
    Some(PathBuf::from(&descriptor[start..start + len]))
}

/// Map half of an app. Emits pairs into `result` for one input file.
pub trait Mapper: Send + Sync {
    fn map(&self, input: &str, result: &mut ResultMap, context: &JobContext) -> anyhow::Result<()>;
}

/// Reduce half of an app. Called once per distinct key; `values` arrive in
/// no guaranteed order, so implementations must not depend on it.
pub trait Reducer: Send + Sync {
    fn reduce(&self, key: &str, values: Vec<String>) -> anyhow::Result<String>;
}

/// Applies `reducer` exactly once per distinct key of `merged`.
pub fn reduce_all(reducer: &dyn Reducer, merged: ResultMap) -> Result<Output, JobError> {
    merged
        .into_iter()
        .map(|(key, values)| {
            let reduced = reducer
                .reduce(&key, values)
                .map_err(|e| JobError::Reduce {
                    key: key.clone(),
                    reason: format!("{e:#}"),
                })?;
            Ok((key, reduced))
        })
        .collect()
}

/// Regular files directly under `input_dir` as (file name, path), sorted by name.
pub fn read_files_from_dir(input_dir: impl AsRef<Path>) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut input: Vec<_> = Vec::new();
    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();

        if path.is_file() {
            let filename = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            input.push((filename, path));
        }
    }
    input.sort();
    Ok(input)
}
