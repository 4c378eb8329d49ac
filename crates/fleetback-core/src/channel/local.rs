use super::CommandChannel;
use super::process::{into_result, trace, wait_for};
use crate::context::Context;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Instant;
use tokio::process::Command;

/// Runs commands on this machine through `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct LocalChannel {
    trace: bool,
}

impl LocalChannel {
    pub fn new(trace: bool) -> Self {
        Self { trace }
    }
}

#[async_trait]
impl CommandChannel for LocalChannel {
    async fn execute(&self, ctx: &Context, command: &str) -> Result<Vec<u8>> {
        let started = Instant::now();
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);

        let result = match wait_for(ctx, cmd, None).await {
            Ok(output) => into_result(command, &output),
            Err(err) => Err(err),
        };
        trace(self.trace, "localhost", command, started, &result);
        result
    }

    async fn read_file(&self, ctx: &Context, path: &str) -> Result<Vec<u8>> {
        ctx.run(tokio::fs::read(path))
            .await?
            .map_err(|e| Error::from(e).context(format!("could not read {path}")))
    }

    async fn write_file(&self, ctx: &Context, path: &str, contents: &[u8]) -> Result<()> {
        ctx.run(tokio::fs::write(path, contents))
            .await?
            .map_err(|e| Error::from(e).context(format!("could not write {path}")))
    }
}
