//! Storage backed by the WebHDFS REST API of a HDFS name node.

use ::std::{
    fs,
    path::{Path, PathBuf},
};

use ::pai_common::{
    anyhow::anyhow,
    error::{PaiError, Result},
    serde::Deserialize,
    tracing::debug,
};
use ::reqwest::{
    blocking::{Client, ClientBuilder, RequestBuilder},
    header::LOCATION,
    redirect::Policy,
    Method, StatusCode,
};

use super::{FileStatus, FileType, Storage};
use crate::http::{send, unexpected};

const API_PREFIX: &str = "/webhdfs/v1";

#[derive(Deserialize)]
#[serde(crate = "pai_common::serde")]
struct FileStatusResponse {
    #[serde(rename = "FileStatus")]
    file_status: FileStatus,
}

/// Client of a WebHDFS endpoint, e.g. `http://10.0.0.1:50070`.
/// Data node redirects are followed by hand, so that file content is sent only to the data node.
pub struct WebHdfs {
    base_url: String,
    /// Sent as `user.name`, the cluster runs without Kerberos.
    user: Option<String>,
    client: Client,
}

impl WebHdfs {
    pub fn new(base_url: impl Into<String>, user: Option<String>) -> Result<Self> {
        Self::with_client_builder(base_url, user, Client::builder())
    }

    /// Build the HTTP client from `builder`, e.g. one with a timeout.
    /// Its redirect policy is replaced, data node redirects are always followed by hand.
    pub fn with_client_builder(
        base_url: impl Into<String>,
        user: Option<String>,
        builder: ClientBuilder,
    ) -> Result<Self> {
        let client = builder
            .redirect(Policy::none())
            .build()
            .map_err(PaiError::storage)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            user,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request on `remote_path` for the WebHDFS operation `op`.
    fn request(&self, method: Method, remote_path: &str, op: &str) -> RequestBuilder {
        let url = format!(
            "{}{}/{}",
            self.base_url,
            API_PREFIX,
            remote_path.trim_start_matches('/')
        );
        let builder = self.client.request(method, url).query(&[("op", op)]);
        match &self.user {
            Some(user) => builder.query(&[("user.name", user)]),
            None => builder,
        }
    }

    /// Send the first half of a two-step operation and return the data node location.
    fn redirect_location(&self, builder: RequestBuilder) -> Result<String> {
        let response = send(builder)?;
        if !response.status().is_redirection() {
            return Err(PaiError::storage(unexpected(response)));
        }
        response
            .headers()
            .get(LOCATION)
            .and_then(|location| location.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| PaiError::storage(anyhow!("redirect without location header")))
    }
}

impl Storage for WebHdfs {
    fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        if !local_path.is_file() {
            return Err(PaiError::storage(anyhow!(
                "file to upload not found: {}",
                local_path.display()
            )));
        }
        let content = fs::read(local_path).map_err(PaiError::storage)?;
        let location = self.redirect_location(
            self.request(Method::PUT, remote_path, "CREATE")
                .query(&[("overwrite", "true")]),
        )?;
        debug!(
            "Uploading {} ({} bytes) to {}",
            local_path.display(),
            content.len(),
            location
        );
        let response = send(self.client.put(location).body(content))?;
        if response.status() != StatusCode::CREATED {
            return Err(PaiError::storage(unexpected(response)));
        }
        Ok(())
    }

    fn download(&self, remote_path: &str, local_path: &Path, overwrite: bool) -> Result<PathBuf> {
        match self.status(remote_path)? {
            None => {
                return Err(PaiError::storage(anyhow!(
                    "{} not found in {}",
                    remote_path,
                    self.base_url
                )))
            }
            Some(FileStatus {
                file_type: FileType::Directory,
                ..
            }) => {
                return Err(PaiError::not_implemented(anyhow!(
                    "downloading directory {} is not supported",
                    remote_path
                )))
            }
            Some(_) => {}
        }

        let file_name = remote_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(remote_path);
        // A missing local path is a file only when it keeps the remote name.
        let into_dir = local_path.is_dir()
            || (!local_path.exists()
                && local_path.file_name().is_some_and(|name| name != file_name));
        let target = if into_dir {
            fs::create_dir_all(local_path).map_err(PaiError::storage)?;
            local_path.join(file_name)
        } else {
            local_path.to_path_buf()
        };
        if target.exists() && !overwrite {
            return Err(PaiError::storage(anyhow!(
                "{} already exists",
                target.display()
            )));
        }
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(PaiError::storage)?;
        }

        let location = self.redirect_location(self.request(Method::GET, remote_path, "OPEN"))?;
        let response = send(self.client.get(location))?;
        if !response.status().is_success() {
            return Err(PaiError::storage(unexpected(response)));
        }
        let content = response.bytes().map_err(PaiError::connectivity)?;
        fs::write(&target, &content).map_err(PaiError::storage)?;
        debug!(
            "Downloaded {} ({} bytes) to {}",
            remote_path,
            content.len(),
            target.display()
        );
        Ok(target)
    }

    fn status(&self, remote_path: &str) -> Result<Option<FileStatus>> {
        let response = send(self.request(Method::GET, remote_path, "GETFILESTATUS"))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let FileStatusResponse { file_status } =
                    response.json().map_err(PaiError::storage)?;
                Ok(Some(file_status))
            }
            _ => Err(PaiError::storage(unexpected(response))),
        }
    }
}
