use std::{fs, path::PathBuf};

use anyhow::Context;

use crate::{
    common::{read_files_from_dir, reduce_all, JobSpec, Output},
    file_manager,
    job_context::JobContext,
    map_reduce_apps::AppRegistry,
    result_map::ResultMap,
};

const JOB_ID: &str = "local";

/// Runs a whole job in this process, one file after another, with no workers.
pub struct SequentialMapReduce {
    job: JobSpec,
    registry: AppRegistry,
}

impl SequentialMapReduce {
    pub fn new(job: JobSpec, registry: AppRegistry) -> Self {
        Self { job, registry }
    }

    pub fn run_sync(&self) -> anyhow::Result<Output> {
        let reducer = self.registry.reducer(&self.job.reducer)?;
        let files = read_files_from_dir(&self.job.input_dir)
            .with_context(|| format!("failed to list {:?}", self.job.input_dir))?;

        let merged = files
            .into_iter()
            .try_fold(ResultMap::new(), |mut acc, (filename, path)| {
                let contents = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {:?}", path))?;
                let context = JobContext::for_task(&filename, JOB_ID);
                let partial = self.registry.run_map(&self.job.mapper, &contents, &context)?;
                tracing::debug!(%filename, keys = partial.len(), "mapped");
                acc.merge(partial);
                anyhow::Ok(acc)
            })?;

        Ok(reduce_all(reducer.as_ref(), merged)?)
    }

    /// Runs the job and writes `result-local.txt` under the output directory.
    pub async fn run(self) -> anyhow::Result<PathBuf> {
        let job = self.job.clone();
        let output = tokio::task::spawn_blocking(move || self.run_sync()).await??;
        let path = file_manager::write_result(&job.output_dir, &format!("result-{JOB_ID}.txt"), &output)
            .await
            .with_context(|| format!("failed to write result under {:?}", job.output_dir))?;
        tracing::info!(path = %path.display(), keys = output.len(), "local job complete");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_reduce_apps::{SUM, WORD_COUNT};

    #[test]
    fn counts_words_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        fs::create_dir(&input).unwrap();
        fs::write(input.join("a.txt"), "the cat sat.").unwrap();
        fs::write(input.join("b.txt"), "the dog sat.").unwrap();

        let job = JobSpec::new(WORD_COUNT, SUM, &input, dir.path().join("out"));
        let output = SequentialMapReduce::new(job, AppRegistry::with_defaults())
            .run_sync()
            .unwrap();

        let expected: Output = [("the", "2"), ("cat", "1"), ("sat", "2"), ("dog", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(output, expected);
    }

    #[tokio::test]
    async fn run_writes_result_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        fs::create_dir(&input).unwrap();
        fs::write(input.join("a.txt"), "pride pride").unwrap();

        let job = JobSpec::new(WORD_COUNT, SUM, &input, dir.path().join("out"));
        let path = SequentialMapReduce::new(job, AppRegistry::with_defaults())
            .run()
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "pride=2\n");
    }
}
