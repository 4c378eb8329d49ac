//! Per-node results of a fleet fan-out and their aggregated error.

use crate::error::Error;
use std::fmt;

/// Outcome of one operation on one node.
#[derive(Debug, Clone)]
pub struct ExecutionResult<T> {
    /// Host the result originates from. Filled in by the fleet.
    pub host: String,
    pub value: Option<T>,
    pub error: Option<Error>,
}

impl<T> ExecutionResult<T> {
    pub fn ok(value: T) -> Self {
        Self {
            host: String::new(),
            value: Some(value),
            error: None,
        }
    }

    pub fn err(error: Error) -> Self {
        Self {
            host: String::new(),
            value: None,
            error: Some(error),
        }
    }

    /// A partial result: the value describes how far the node got before `error`.
    pub fn partial(value: T, error: Error) -> Self {
        Self {
            host: String::new(),
            value: Some(value),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub(crate) fn tagged(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

impl<T> From<crate::error::Result<T>> for ExecutionResult<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(error) => Self::err(error),
        }
    }
}

/// Results of a fan-out, in the fleet's configured host order.
#[derive(Debug, Clone)]
pub struct ExecutionResults<T> {
    results: Vec<ExecutionResult<T>>,
}

impl<T> ExecutionResults<T> {
    pub(crate) fn from_ordered(results: Vec<ExecutionResult<T>>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, host: &str) -> Option<&ExecutionResult<T>> {
        self.results.iter().find(|r| r.host == host)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExecutionResult<T>> {
        self.results.iter()
    }

    /// Number of results without an error.
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    /// Aggregated view of every failed node, or `None` when all succeeded.
    pub fn errors(&self) -> Option<NodeFailures> {
        let failures: Vec<(String, Error)> = self
            .results
            .iter()
            .filter_map(|r| r.error.clone().map(|e| (r.host.clone(), e)))
            .collect();

        if failures.is_empty() {
            None
        } else {
            Some(NodeFailures(failures))
        }
    }

    /// Transforms every value while keeping hosts and errors.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> ExecutionResults<U> {
        ExecutionResults {
            results: self
                .results
                .into_iter()
                .map(|r| ExecutionResult {
                    host: r.host,
                    value: r.value.map(&mut f),
                    error: r.error,
                })
                .collect(),
        }
    }
}

impl<T> IntoIterator for ExecutionResults<T> {
    type Item = ExecutionResult<T>;
    type IntoIter = std::vec::IntoIter<ExecutionResult<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ExecutionResults<T> {
    type Item = &'a ExecutionResult<T>;
    type IntoIter = std::slice::Iter<'a, ExecutionResult<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Ordered list of `(host, error)` pairs from a fan-out.
#[derive(Debug, Clone, Default)]
pub struct NodeFailures(Vec<(String, Error)>);

impl NodeFailures {
    pub fn new(failures: Vec<(String, Error)>) -> Self {
        Self(failures)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.0.iter().map(|(host, err)| (host.as_str(), err))
    }
}

impl fmt::Display for NodeFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.len() {
            1 => write!(f, "1 error occurred:")?,
            n => write!(f, "{n} errors occurred:")?,
        }
        for (host, err) in &self.0 {
            write!(f, "\n\t* {host}: {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for NodeFailures {}
