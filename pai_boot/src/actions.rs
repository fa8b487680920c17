//! Built-in bootstrap actions.

use ::std::{
    fs,
    path::PathBuf,
    process::Command,
};

use ::pai_client::storage::{Storage, WebHdfs};
use ::pai_common::{
    anyhow::{self, anyhow, bail, Context},
    config::DEFAULT_WEBHDFS_PORT,
    env,
    serde::Deserialize,
    tracing::{debug, info, warn},
};

use crate::ActionRegistry;

/// Register every built-in action in `registry`.
pub fn register_builtins(registry: &mut ActionRegistry) {
    registry
        .register("common.hello_world", hello_world)
        .register("common.run_commands", run_commands)
        .register("hdfs.download", hdfs_download)
        .register("hdfs.upload", hdfs_upload)
        .register("ssh.install_key", install_key);
}

/// Arguments of an action that takes none.
#[derive(Debug, Deserialize)]
#[serde(crate = "pai_common::serde")]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

pub fn hello_world(_: NoArgs) -> anyhow::Result<()> {
    println!("hello, world!");
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(crate = "pai_common::serde")]
#[serde(deny_unknown_fields)]
pub struct RunCommandsArgs {
    pub commands: Vec<String>,
}

/// Run shell commands one after another, failing on the first non-zero exit.
pub fn run_commands(args: RunCommandsArgs) -> anyhow::Result<()> {
    for command in &args.commands {
        info!("Running `{}`", command);
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .with_context(|| format!("cannot run `{}`", command))?;
        if !status.success() {
            bail!("`{}` exited with {}", command, status);
        }
    }
    Ok(())
}

/// Where the WebHDFS endpoint is. Missing values come from the container environment.
#[derive(Debug, Default, Deserialize)]
#[serde(crate = "pai_common::serde")]
#[serde(deny_unknown_fields)]
pub struct HdfsClientArgs {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
}

impl HdfsClientArgs {
    fn connect(self) -> anyhow::Result<WebHdfs> {
        let ip = match self.ip {
            Some(ip) => ip,
            None => env::default_fs_ip()?.to_string(),
        };
        let user = match self.user {
            Some(user) => user,
            None => env::user_name()?,
        };
        let port = self.port.unwrap_or(DEFAULT_WEBHDFS_PORT);
        Ok(WebHdfs::new(format!("http://{}:{}", ip, port), Some(user))?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(crate = "pai_common::serde")]
#[serde(deny_unknown_fields)]
pub struct HdfsDownloadArgs {
    pub hdfs_path: String,
    pub local_path: PathBuf,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub client: HdfsClientArgs,
}

pub fn hdfs_download(args: HdfsDownloadArgs) -> anyhow::Result<()> {
    let storage = args.client.connect()?;
    let written = storage.download(&args.hdfs_path, &args.local_path, args.overwrite)?;
    info!("Downloaded {} to {}", args.hdfs_path, written.display());
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(crate = "pai_common::serde")]
#[serde(deny_unknown_fields)]
pub struct HdfsUploadArgs {
    pub local_path: PathBuf,
    pub hdfs_path: String,
    #[serde(default)]
    pub client: HdfsClientArgs,
}

pub fn hdfs_upload(args: HdfsUploadArgs) -> anyhow::Result<()> {
    let storage = args.client.connect()?;
    storage.upload(&args.local_path, &args.hdfs_path)?;
    info!("Uploaded {} to {}", args.local_path.display(), args.hdfs_path);
    Ok(())
}

/// Install a private key. Exactly one of `key` and `key_env` is given.
/// The key is written as is: secrets belong in a secret store, not in the bootstrap file.
#[derive(Debug, Deserialize)]
#[serde(crate = "pai_common::serde")]
#[serde(deny_unknown_fields)]
pub struct InstallKeyArgs {
    pub path: PathBuf,
    #[serde(default)]
    pub key: Option<String>,
    /// Environment variable holding the key.
    #[serde(default)]
    pub key_env: Option<String>,
}

pub fn install_key(args: InstallKeyArgs) -> anyhow::Result<()> {
    let key = match (args.key, args.key_env) {
        (Some(key), None) => key,
        (None, Some(name)) => env::require(&name)?,
        _ => return Err(anyhow!("exactly one of `key` and `key_env` is required")),
    };
    if let Some(parent) = args.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    if args.path.exists() {
        warn!("Overwriting key {}", args.path.display());
    }
    fs::write(&args.path, key).with_context(|| format!("cannot write {}", args.path.display()))?;
    restrict_permissions(&args.path)?;
    debug!("Installed key {}", args.path.display());
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) -> anyhow::Result<()> {
    use ::std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("cannot restrict permissions of {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_: &std::path::Path) -> anyhow::Result<()> {
    Ok(())
}
