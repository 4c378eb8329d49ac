use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Whether commands run on this machine or on the configured hosts over SSH.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Local,
    Ssh,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub credentials: CredentialsConfig,
    pub awscli: Option<AwsCliConfig>,
    pub log: LogConfig,
    pub backup: BackupConfig,
    pub notifier: NotifierConfig,
    pub commands: CommandsConfig,
    #[serde(skip)]
    pub mode: ExecutionMode,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterConfig {
    pub hosts: Vec<String>,
    pub data_path: Option<String>,
    pub cluster_name: Option<String>,
    pub binaries: BinariesConfig,
    #[serde(alias = "skipdnsresolve")]
    pub skip_dns_resolve: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BinariesConfig {
    pub cqlsh: Option<String>,
    pub nodetool: Option<String>,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AwsCliConfig {
    pub binary: Option<String>,
    pub bucket: String,
    #[serde(alias = "endpointurl")]
    pub endpoint_url: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackupConfig {
    pub snapshot_tag: Option<String>,
    pub local_path: Option<String>,
    pub keyspaces: Vec<String>,
    pub disable_upload: bool,
    pub cleanup_local: bool,
    pub cleanup_remote: bool,
    /// Zero keeps remote backups forever.
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub retention: Duration,
    pub archive: Option<ArchiveConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub method: String,
    pub options: ArchiveOptionsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArchiveOptionsConfig {
    pub compression: String,
    pub threads: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookConfig {
    pub url: String,
    #[serde(alias = "messagefield")]
    pub message_field: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Trace every command with its output.
    pub debug: bool,
    pub ssh: SshConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SshConfig {
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub key_file: Option<PathBuf>,
    /// Rejected during validation; encrypted keys belong in ssh-agent.
    pub key_password: Option<String>,
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub connect_timeout: Duration,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: 22,
            username: "root".to_string(),
            password: None,
            key_file: None,
            key_password: None,
            connect_timeout: Duration::from_secs(2),
        }
    }
}

impl std::fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConfig")
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("key_file", &self.key_file)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
