//! Configuration for paiclient.

use ::std::{fs::File, io::BufReader, path::Path};

use ::serde::{de::DeserializeOwned, Deserialize, Serialize};
use ::serde_json::from_reader;

use crate::{
    env,
    error::{PaiError, Result},
};

/// Default port of the WebHDFS REST endpoint on the name node.
pub const DEFAULT_WEBHDFS_PORT: u16 = 50070;

/// Connection information of an OpenPAI cluster.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the cluster, e.g. `http://10.0.0.1`
    pub pai_uri: String,
    pub user: String,
    /// Not needed when a token is supplied externally.
    #[serde(default)]
    pub passwd: Option<String>,
    /// WebHDFS endpoint used as the default storage, e.g. `http://10.0.0.1:50070`
    #[serde(default)]
    pub hdfs_web_uri: Option<String>,
}

impl ClientConfig {
    /// Build the config from the variables OpenPAI sets inside a job container.
    pub fn from_env(pai_uri: String) -> Result<Self> {
        let ip = env::default_fs_ip()?;
        Ok(Self {
            pai_uri,
            user: env::user_name()?,
            passwd: None,
            hdfs_web_uri: Some(format!("http://{}:{}", ip, DEFAULT_WEBHDFS_PORT)),
        })
    }
}

/// Load a JSON config file.
pub fn load_config<C, P>(path: P) -> Result<C>
where
    C: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(PaiError::fail_to_load_config)?;
    let reader = BufReader::new(file);
    let config = from_reader(reader).map_err(PaiError::fail_to_load_config)?;
    Ok(config)
}
