//! OpenSSH transport
//!
//! One master connection per host (`ControlMaster`), established once and
//! reused by every command and file transfer through its control socket.

use super::CommandChannel;
use super::factory::Dialer;
use super::process::{into_result, trace, wait_for};
use super::shell::quote;
use crate::context::Context;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::Command;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// How the master connection authenticates.
#[derive(Clone, Default)]
pub enum SshAuth {
    /// Keys from the agent or the user's ssh config.
    #[default]
    Agent,
    KeyFile(PathBuf),
    /// Requires `sshpass` on this machine.
    Password(String),
}

impl fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SshAuth::Agent => write!(f, "Agent"),
            SshAuth::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            SshAuth::Password(_) => write!(f, "Password(***)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SshSettings {
    pub port: u16,
    pub user: String,
    pub auth: SshAuth,
    pub connect_timeout: Duration,
    /// Log every command with its duration and output.
    pub trace: bool,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_SSH_PORT,
            user: "root".to_string(),
            auth: SshAuth::Agent,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            trace: false,
        }
    }
}

/// A command channel multiplexed over an established master connection.
#[derive(Debug)]
pub struct SshChannel {
    host: String,
    settings: Arc<SshSettings>,
    control_path: PathBuf,
}

impl SshChannel {
    /// Starts the master connection to `host`, bounded by the connect timeout.
    pub async fn connect(
        ctx: &Context,
        host: &str,
        settings: Arc<SshSettings>,
        control_dir: &Path,
    ) -> Result<Self> {
        let channel = Self {
            host: host.to_string(),
            control_path: control_dir.join("%C"),
            settings,
        };

        // The forked master keeps inherited pipes open, so stderr goes to a file.
        let log_path = control_dir.join(format!("{}.log", host.replace(['/', ':'], "_")));
        let log = tokio::fs::File::create(&log_path).await?.into_std().await;

        let mut cmd = channel.master_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .kill_on_drop(true);

        tracing::debug!(host, port = channel.settings.port, user = %channel.settings.user, "Opening SSH master connection");

        let dial = ctx.with_timeout(channel.settings.connect_timeout);
        let outcome = async {
            let mut child = cmd.spawn()?;
            Ok::<_, std::io::Error>(dial.run(child.wait()).await)
        }
        .await;

        let reason = match outcome {
            Ok(Ok(Ok(status))) if status.success() => return Ok(channel),
            Ok(Ok(Ok(_))) => tokio::fs::read_to_string(&log_path)
                .await
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            Ok(Ok(Err(err))) | Err(err) => err.to_string(),
            Ok(Err(interrupted)) => {
                if let Some(parent) = ctx.err() {
                    return Err(parent.into());
                }
                interrupted.to_string()
            }
        };

        Err(channel.connection_error(reason))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn connection_error(&self, reason: String) -> Error {
        Error::Connection {
            host: self.host.clone(),
            user: self.settings.user.clone(),
            reason,
        }
    }

    fn common_args(&self, cmd: &mut Command) {
        cmd.arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()))
            .arg("-p")
            .arg(self.settings.port.to_string())
            .arg("-l")
            .arg(&self.settings.user);
    }

    fn master_command(&self) -> Command {
        let mut cmd = match &self.settings.auth {
            SshAuth::Password(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.env("SSHPASS", password).arg("-e").arg("ssh");
                cmd
            }
            _ => {
                let mut cmd = Command::new("ssh");
                cmd.arg("-o").arg("BatchMode=yes");
                cmd
            }
        };

        let timeout_secs = self.settings.connect_timeout.as_secs().max(1);
        cmd.args(["-o", "ControlMaster=yes", "-o", "ControlPersist=yes"])
            .args(["-o", "StrictHostKeyChecking=no"])
            .args(["-o", "UserKnownHostsFile=/dev/null"])
            .args(["-o", "LogLevel=ERROR"])
            .arg("-o")
            .arg(format!("ConnectTimeout={timeout_secs}"));
        if let SshAuth::KeyFile(key) = &self.settings.auth {
            cmd.arg("-i").arg(key);
        }
        self.common_args(&mut cmd);
        cmd.arg("-N").arg("-f").arg(&self.host);
        cmd
    }

    fn session_command(&self, remote: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(["-o", "ControlMaster=no", "-o", "BatchMode=yes"]);
        self.common_args(&mut cmd);
        cmd.arg(&self.host).arg("--").arg(remote);
        cmd
    }
}

#[async_trait]
impl CommandChannel for SshChannel {
    async fn execute(&self, ctx: &Context, command: &str) -> Result<Vec<u8>> {
        let started = Instant::now();
        let result = match wait_for(ctx, self.session_command(command), None).await {
            Ok(output) => into_result(command, &output),
            Err(err) => Err(err),
        };
        trace(self.settings.trace, &self.host, command, started, &result);
        result
    }

    async fn read_file(&self, ctx: &Context, path: &str) -> Result<Vec<u8>> {
        let command = format!("cat {}", quote(path));
        let output = wait_for(ctx, self.session_command(&command), None).await?;
        into_result(&command, &output)?;
        Ok(output.stdout)
    }

    async fn write_file(&self, ctx: &Context, path: &str, contents: &[u8]) -> Result<()> {
        let command = format!("cat > {}", quote(path));
        let output = wait_for(ctx, self.session_command(&command), Some(contents)).await?;
        into_result(&command, &output).map(|_| ())
    }

    async fn close(&self, ctx: &Context) -> Result<()> {
        let mut cmd = Command::new("ssh");
        cmd.args(["-O", "exit"]);
        self.common_args(&mut cmd);
        cmd.arg(&self.host);
        let output = wait_for(ctx, cmd, None).await?;
        into_result("ssh -O exit", &output).map(|_| ())
    }
}

/// Opens [`SshChannel`]s with one set of settings, keeping control sockets in
/// a private temporary directory that is removed on drop.
#[derive(Debug)]
pub struct SshDialer {
    settings: Arc<SshSettings>,
    control_dir: TempDir,
}

impl SshDialer {
    pub fn new(settings: SshSettings) -> Result<Self> {
        let control_dir = tempfile::Builder::new().prefix("fleetback-ssh").tempdir()?;
        Ok(Self {
            settings: Arc::new(settings),
            control_dir,
        })
    }

    pub fn settings(&self) -> &SshSettings {
        &self.settings
    }
}

#[async_trait]
impl Dialer for SshDialer {
    async fn dial(&self, ctx: &Context, host: &str) -> Result<Arc<dyn CommandChannel>> {
        let channel =
            SshChannel::connect(ctx, host, Arc::clone(&self.settings), self.control_dir.path())
                .await?;
        Ok(Arc::new(channel))
    }
}
