use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use anyhow::Context;
use regex::Regex;

use crate::{
    common::{Mapper, Reducer},
    error::{JobError, WorkerError},
    job_context::JobContext,
    result_map::ResultMap,
};

pub const WORD_COUNT: &str = "word-count";
pub const SUM: &str = "sum";
pub const COUNT: &str = "count";

static WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z0-9]+\b").expect("invalid regex"));

/// Emits `(word, "1")` for every alphanumeric word, lowercased.
///
/// Case folding feeds convergence too: `Pride` and `PRIDE` both count toward
/// a `pride` key, so an iterated job crosses its threshold sooner than it
/// would with a case-sensitive count.
pub struct WordCount;

impl Mapper for WordCount {
    fn map(&self, input: &str, result: &mut ResultMap, _context: &JobContext) -> anyhow::Result<()> {
        for word in WORDS.find_iter(input) {
            result.write(word.as_str().to_lowercase(), "1");
        }
        Ok(())
    }
}

/// Parses every value as an integer and adds them up.
pub struct Sum;

impl Reducer for Sum {
    fn reduce(&self, key: &str, values: Vec<String>) -> anyhow::Result<String> {
        let mut total: i64 = 0;
        for value in values {
            let n: i64 = value
                .trim()
                .parse()
                .with_context(|| format!("value `{value}` for key `{key}` is not an integer"))?;
            total = total
                .checked_add(n)
                .with_context(|| format!("sum overflow for key `{key}`"))?;
        }
        Ok(total.to_string())
    }
}

/// Number of values, regardless of their content.
pub struct Count;

impl Reducer for Count {
    fn reduce(&self, _key: &str, values: Vec<String>) -> anyhow::Result<String> {
        Ok(values.len().to_string())
    }
}

/// Resolves mapper and reducer identifiers to implementations. Both sides of
/// the RPC boundary hold one, so only the identifier travels.
#[derive(Clone, Default)]
pub struct AppRegistry {
    mappers: HashMap<String, Arc<dyn Mapper>>,
    reducers: HashMap<String, Arc<dyn Reducer>>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        Self::new()
            .with_mapper(WORD_COUNT, WordCount)
            .with_reducer(SUM, Sum)
            .with_reducer(COUNT, Count)
    }

    pub fn with_mapper(mut self, name: &str, mapper: impl Mapper + 'static) -> Self {
        self.mappers.insert(name.to_string(), Arc::new(mapper));
        self
    }

    pub fn with_reducer(mut self, name: &str, reducer: impl Reducer + 'static) -> Self {
        self.reducers.insert(name.to_string(), Arc::new(reducer));
        self
    }

    pub fn mapper(&self, name: &str) -> Result<Arc<dyn Mapper>, WorkerError> {
        self.mappers
            .get(name)
            .cloned()
            .ok_or_else(|| WorkerError::UnknownMapper(name.to_string()))
    }

    pub fn reducer(&self, name: &str) -> Result<Arc<dyn Reducer>, JobError> {
        self.reducers
            .get(name)
            .cloned()
            .ok_or_else(|| JobError::UnknownReducer(name.to_string()))
    }

    /// Runs mapper `name` over `input`.
    pub fn run_map(
        &self,
        name: &str,
        input: &str,
        context: &JobContext,
    ) -> Result<ResultMap, WorkerError> {
        let mapper = self.mapper(name)?;
        let mut result = ResultMap::new();
        mapper
            .map(input, &mut result, context)
            .map_err(|e| WorkerError::MapFailed {
                mapper: name.to_string(),
                reason: format!("{e:#}"),
            })?;
        Ok(result)
    }
}
