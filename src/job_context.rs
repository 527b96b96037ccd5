use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const FILENAME: &str = "filename";
pub const JOB_ID: &str = "jobid";

/// Read-only configuration a task hands to its mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobContext {
    config: BTreeMap<String, String>,
}

impl JobContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_task(filename: &str, job_id: &str) -> Self {
        Self::new()
            .with_config(FILENAME, filename)
            .with_config(JOB_ID, job_id)
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    pub fn filename(&self) -> Option<&str> {
        self.get(FILENAME)
    }

    pub fn job_id(&self) -> Option<&str> {
        self.get(JOB_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::JobContext;

    #[test]
    fn task_context_carries_filename_and_job_id() {
        let context = JobContext::for_task("pg-pride.txt", "job-1");
        assert_eq!(context.filename(), Some("pg-pride.txt"));
        assert_eq!(context.job_id(), Some("job-1"));
        assert_eq!(context.get("other"), None);
    }
}
