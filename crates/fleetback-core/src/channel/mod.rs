//! Command channels
//!
//! A [`CommandChannel`] executes shell commands and moves files on one node.
//! [`LocalChannel`] runs everything on this machine, [`SshChannel`] multiplexes
//! over a persistent OpenSSH master connection. [`ChannelFactory`] hands out
//! channels per host.

mod factory;
mod local;
mod process;
pub mod shell;
mod ssh;

pub use factory::{ChannelFactory, ChannelProvider, Dialer, SessionCache};
pub use local::LocalChannel;
pub use ssh::{SshAuth, SshChannel, SshDialer, SshSettings};

use crate::context::Context;
use crate::error::Result;
use async_trait::async_trait;

/// Executes commands and transfers files on a single node.
#[async_trait]
pub trait CommandChannel: Send + Sync + std::fmt::Debug {
    /// Runs `command` through the node's shell and returns its combined output.
    ///
    /// A non-zero exit yields [`Error::CommandFailed`](crate::Error::CommandFailed)
    /// carrying the output. Cancelling `ctx` kills the process and yields
    /// [`Error::Interrupted`](crate::Error::Interrupted).
    async fn execute(&self, ctx: &Context, command: &str) -> Result<Vec<u8>>;

    /// Runs `command`, discarding its output.
    async fn run(&self, ctx: &Context, command: &str) -> Result<()> {
        self.execute(ctx, command).await.map(|_| ())
    }

    /// Like [`execute`](Self::execute) but decodes the output as text.
    async fn output(&self, ctx: &Context, command: &str) -> Result<String> {
        let bytes = self.execute(ctx, command).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn read_file(&self, ctx: &Context, path: &str) -> Result<Vec<u8>>;

    async fn write_file(&self, ctx: &Context, path: &str, contents: &[u8]) -> Result<()>;

    /// Releases the underlying session, if any.
    async fn close(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }
}
