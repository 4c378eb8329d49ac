//! Test doubles for channels and channel providers.

use crate::channel::{ChannelProvider, CommandChannel};
use crate::context::Context;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Rule {
    needle: String,
    responses: VecDeque<Result<String>>,
}

/// A command channel that answers from a script and records every command.
///
/// The first rule whose needle is contained in the command answers it. A rule
/// with several responses hands them out in order and repeats the last one.
/// Unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn rule(self, needle: &str, responses: Vec<Result<String>>) -> Self {
        lock(&self.rules).push(Rule {
            needle: needle.to_string(),
            responses: responses.into(),
        });
        self
    }

    pub fn on(self, needle: &str, output: &str) -> Self {
        self.rule(needle, vec![Ok(output.to_string())])
    }

    pub fn on_sequence(self, needle: &str, outputs: &[&str]) -> Self {
        self.rule(needle, outputs.iter().map(|o| Ok(o.to_string())).collect())
    }

    /// Matching commands exit with status 1 and `output`.
    pub fn fail_on(self, needle: &str, output: &str) -> Self {
        let error = Error::CommandFailed {
            command: needle.to_string(),
            status: Some(1),
            output: output.to_string(),
        };
        self.rule(needle, vec![Err(error)])
    }

    /// Matching commands succeed `times` times, then fail like [`Self::fail_on`].
    pub fn fail_after(self, needle: &str, times: usize, output: &str) -> Self {
        let mut responses: Vec<Result<String>> = vec![Ok(String::new()); times];
        responses.push(Err(Error::CommandFailed {
            command: needle.to_string(),
            status: Some(1),
            output: output.to_string(),
        }));
        self.rule(needle, responses)
    }

    pub fn error_on(self, needle: &str, error: Error) -> Self {
        self.rule(needle, vec![Err(error)])
    }

    pub fn with_file(self, path: &str, contents: &[u8]) -> Self {
        lock(&self.files).insert(path.to_string(), contents.to_vec());
        self
    }

    /// Every executed command, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.files).get(path).cloned()
    }

    fn respond(&self, command: &str) -> Result<String> {
        let mut rules = lock(&self.rules);
        let Some(rule) = rules.iter_mut().find(|r| command.contains(&r.needle)) else {
            return Ok(String::new());
        };
        if rule.responses.len() > 1 {
            rule.responses.pop_front().unwrap_or(Ok(String::new()))
        } else {
            rule.responses.front().cloned().unwrap_or(Ok(String::new()))
        }
    }
}

#[async_trait]
impl CommandChannel for ScriptedChannel {
    async fn execute(&self, ctx: &Context, command: &str) -> Result<Vec<u8>> {
        lock(&self.calls).push(command.to_string());
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }
        self.respond(command).map(String::into_bytes)
    }

    async fn read_file(&self, _ctx: &Context, path: &str) -> Result<Vec<u8>> {
        self.file(path).ok_or_else(|| {
            Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()))
        })
    }

    async fn write_file(&self, _ctx: &Context, path: &str, contents: &[u8]) -> Result<()> {
        lock(&self.files).insert(path.to_string(), contents.to_vec());
        Ok(())
    }
}

/// Hands out pre-built channels per host; unknown hosts fail to connect.
#[derive(Default)]
pub struct StaticProvider {
    channels: HashMap<String, Arc<dyn CommandChannel>>,
    failures: HashMap<String, Error>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, host: &str, channel: Arc<dyn CommandChannel>) -> Self {
        self.channels.insert(host.to_string(), channel);
        self
    }

    pub fn with_failure(mut self, host: &str, error: Error) -> Self {
        self.failures.insert(host.to_string(), error);
        self
    }
}

#[async_trait]
impl ChannelProvider for StaticProvider {
    async fn channel_for(&self, _ctx: &Context, host: &str) -> Result<Arc<dyn CommandChannel>> {
        if let Some(err) = self.failures.get(host) {
            return Err(err.clone());
        }
        self.channels.get(host).cloned().ok_or_else(|| Error::Connection {
            host: host.to_string(),
            user: "root".to_string(),
            reason: "unknown host".to_string(),
        })
    }
}
