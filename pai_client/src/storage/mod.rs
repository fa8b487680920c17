//! Remote storage used to stage job sources.

use ::std::path::{Path, PathBuf};

use ::pai_common::{error::Result, serde::Deserialize};

mod webhdfs;

pub use webhdfs::WebHdfs;

/// Type of a remote path.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(crate = "pai_common::serde")]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    File,
    Directory,
}

/// Status of a remote path.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(crate = "pai_common::serde")]
pub struct FileStatus {
    #[serde(rename = "type")]
    pub file_type: FileType,
    #[serde(default)]
    pub length: u64,
}

/// A single remote storage endpoint.
pub trait Storage {
    /// Upload the local file `local_path` to `remote_path`, overwriting it.
    fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()>;

    /// Download the remote file `remote_path`.
    /// If `local_path` is an existing directory, the file is written into it under its remote name.
    /// A missing `local_path` with another name than the remote file is created as that directory.
    /// # Return
    /// The local path written.
    fn download(&self, remote_path: &str, local_path: &Path, overwrite: bool) -> Result<PathBuf>;

    /// Return `Ok(None)` if `remote_path` does not exist.
    fn status(&self, remote_path: &str) -> Result<Option<FileStatus>>;
}
