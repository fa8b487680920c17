//! Client of the OpenPAI REST server.

use ::pai_common::{
    anyhow::{self, anyhow},
    config::ClientConfig,
    env,
    error::{PaiError, Result},
    job::{staged_path, Job},
    serde::Deserialize,
    serde_json::{json, Value},
    tracing::{debug, info, info_span, Span},
};
use ::reqwest::{
    blocking::{Client, RequestBuilder},
    StatusCode,
};
use ::time::{Duration, OffsetDateTime};

use crate::{
    http::{send, unexpected},
    storage::{Storage, WebHdfs},
};

/// Default lifetime of a token, in seconds.
pub const DEFAULT_TOKEN_EXPIRATION_SECS: u64 = 3600;

/// Bearer token issued by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    /// `None` when the token was supplied by the caller.
    pub expires_at: Option<OffsetDateTime>,
}

impl Token {
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= OffsetDateTime::now_utc())
    }
}

#[derive(Deserialize)]
#[serde(crate = "pai_common::serde")]
struct TokenResponse {
    token: String,
}

/// Client for submitting and querying jobs of one user on one cluster.
pub struct JobClient {
    /// Base URL of the cluster, without trailing `/`.
    endpoint: String,
    user: String,
    password: Option<String>,
    /// The first storage is used to stage job sources.
    storages: Vec<Box<dyn Storage>>,
    token: Option<Token>,
    /// Environment variable telling that we are inside a job container.
    container_marker: String,
    client: Client,
    span: Span,
}

impl JobClient {
    pub fn new(endpoint: impl Into<String>, user: impl Into<String>, password: Option<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_owned();
        let user = user.into();
        let span = info_span!("job_client", endpoint = %endpoint, user = %user);
        Self {
            endpoint,
            user,
            password,
            storages: Vec::new(),
            token: None,
            container_marker: env::CONTAINER_ID.to_owned(),
            client: Client::new(),
            span,
        }
    }

    /// Create a client with the WebHDFS storage of the config, if any.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let ClientConfig {
            pai_uri,
            user,
            passwd,
            hdfs_web_uri,
        } = config;
        let mut client = Self::new(pai_uri, user, passwd);
        if let Some(uri) = hdfs_web_uri {
            client.add_webhdfs(uri)?;
        }
        Ok(client)
    }

    /// Create a client from the variables OpenPAI sets inside a job container.
    pub fn from_env(endpoint: impl Into<String>) -> Result<Self> {
        Self::from_config(ClientConfig::from_env(endpoint.into())?)
    }

    /// Use a preconfigured HTTP client, e.g. one with a timeout, for REST calls.
    /// Storages keep their own client, see [WebHdfs::with_client_builder].
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Use a token obtained elsewhere instead of calling [JobClient::acquire_token].
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Token {
            value: token.into(),
            expires_at: None,
        });
        self
    }

    /// Change the environment variable that marks a job container.
    pub fn with_container_marker(mut self, marker: impl Into<String>) -> Self {
        self.container_marker = marker.into();
        self
    }

    pub fn add_storage(&mut self, storage: Box<dyn Storage>) -> &mut Self {
        self.storages.push(storage);
        self
    }

    pub fn add_webhdfs(&mut self, hdfs_web_uri: impl Into<String>) -> Result<&mut Self> {
        let storage = WebHdfs::new(hdfs_web_uri, Some(self.user.clone()))?;
        Ok(self.add_storage(Box::new(storage)))
    }

    /// The default storage.
    pub fn storage(&self) -> Option<&dyn Storage> {
        self.storages.first().map(|storage| &**storage)
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Request a new token valid for `expiration_secs` and cache it.
    /// Call again to refresh an expired token.
    pub fn acquire_token(&mut self, expiration_secs: u64) -> Result<&mut Self> {
        let _guard = self.span.clone().entered();
        let password = self.password.as_deref().ok_or_else(|| {
            PaiError::authentication(anyhow!("no password for user {}", self.user))
        })?;
        let body = json!({
            "username": self.user,
            "password": password,
            "expiration": expiration_secs,
        });
        let requested_at = OffsetDateTime::now_utc();
        let response = send(self.client.post(self.build_url("/token")).json(&body))?;
        if !response.status().is_success() {
            return Err(PaiError::authentication(unexpected(response)));
        }
        let TokenResponse { token } = response.json().map_err(|e| {
            PaiError::authentication(anyhow::Error::new(e).context("malformed token response"))
        })?;
        let lifetime = Duration::seconds(i64::try_from(expiration_secs).unwrap_or(i64::MAX));
        self.token = Some(Token {
            value: token,
            expires_at: requested_at.checked_add(lifetime),
        });
        info!("Acquired token valid for {} seconds", expiration_secs);
        Ok(self)
    }

    /// Stage the sources of `job` and submit it.
    /// On success, `job.code_dir` points at the staged sources.
    /// # Return
    /// URL of the job detail page. It is built from the job name,
    /// so resubmitting the same name yields the same URL for a different job.
    pub fn submit(&self, job: &mut Job, allow_nested_submission: bool) -> Result<String> {
        let _guard = self.span.enter();
        if !allow_nested_submission && env::in_job_container(&self.container_marker) {
            return Err(PaiError::policy(anyhow!(
                "submitting job {} inside a job container is not allowed",
                job.name
            )));
        }
        job.validate()?;
        let token = self.token.as_ref().ok_or_else(|| {
            PaiError::authentication(anyhow!("no token, call acquire_token before submitting"))
        })?;

        if !job.sources.is_empty() {
            self.stage_sources(job)?;
        }

        let response = send(
            self.with_bearer(
                self.client
                    .post(self.build_url(&format!("/user/{}/jobs", self.user)))
                    .json(&*job),
                token,
            ),
        )?;
        if response.status() != StatusCode::ACCEPTED {
            return Err(PaiError::submission(unexpected(response)));
        }
        info!("Submitted job {}", job.name);
        Ok(format!(
            "{}/job-detail.html?username={}&jobName={}",
            self.endpoint, self.user, job.name
        ))
    }

    /// Upload the sources one by one, stopping at the first failure.
    /// Files uploaded before a failure are left in place.
    fn stage_sources(&self, job: &mut Job) -> Result<()> {
        let storage = self.storage().ok_or_else(|| {
            PaiError::validation(anyhow!(
                "job {} has source files but no storage is configured",
                job.name
            ))
        })?;
        let staging_dir = job.staging_dir();
        for file in &job.sources {
            let remote_path = staged_path(&staging_dir, file);
            debug!("Staging {} to {}", file.display(), remote_path);
            storage.upload(file, &remote_path).map_err(|e| {
                PaiError::upload(
                    anyhow::Error::new(e).context(format!("failed to upload {}", file.display())),
                )
            })?;
        }
        job.code_dir = format!("${}{}", env::DEFAULT_FS_URI, staging_dir);
        Ok(())
    }

    /// Raw records of all jobs of the user, or of the single job `name`.
    pub fn list_jobs(&self, name: Option<&str>) -> Result<Vec<Value>> {
        let _guard = self.span.enter();
        let path = match name {
            Some(name) => format!("/user/{}/jobs/{}", self.user, name),
            None => format!("/user/{}/jobs", self.user),
        };
        let builder = self.client.get(self.build_url(&path));
        let builder = match &self.token {
            Some(token) => self.with_bearer(builder, token),
            None => builder,
        };
        let response = send(builder)?;
        if !response.status().is_success() {
            return Err(PaiError::submission(unexpected(response)));
        }
        let records: Value = response.json().map_err(|e| {
            PaiError::submission(anyhow::Error::new(e).context("malformed job list"))
        })?;
        match records {
            Value::Array(records) => Ok(records),
            record @ Value::Object(_) => Ok(vec![record]),
            other => Err(PaiError::submission(anyhow!(
                "expected job records, got {}",
                other
            ))),
        }
    }

    /// Names of all jobs of the user, or of the single job `name`.
    pub fn list_job_names(&self, name: Option<&str>) -> Result<Vec<String>> {
        self.list_jobs(name)?
            .into_iter()
            .map(|record| {
                record
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        PaiError::submission(anyhow!("job record without name: {}", record))
                    })
            })
            .collect()
    }

    /// Build a full URL of the REST server from a path.
    fn build_url(&self, path: &str) -> String {
        format!("{}/rest-server/api/v1{}", self.endpoint, path)
    }

    fn with_bearer(&self, builder: RequestBuilder, token: &Token) -> RequestBuilder {
        if token.is_expired() {
            debug!("Token expired, the request will probably be rejected");
        }
        builder.bearer_auth(&token.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_without_trailing_slash() {
        let client = JobClient::new("http://10.0.0.1/", "alice", None);
        assert_eq!(
            client.build_url("/user/alice/jobs"),
            "http://10.0.0.1/rest-server/api/v1/user/alice/jobs"
        );
    }

    #[test]
    fn supplied_token_never_expires() {
        let client = JobClient::new("http://10.0.0.1", "alice", None).with_token("abc");
        let token = client.token().unwrap();
        assert_eq!(token.value, "abc");
        assert!(!token.is_expired());
    }

    #[test]
    fn token_expires() {
        let token = Token {
            value: "abc".to_owned(),
            expires_at: Some(OffsetDateTime::now_utc() - Duration::seconds(1)),
        };
        assert!(token.is_expired());
    }

    #[test]
    fn acquire_token_without_password() {
        let mut client = JobClient::new("http://10.0.0.1", "alice", None);
        let err = client.acquire_token(60).map(|_| ()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Authentication error: no password for user alice"
        );
        assert!(client.token().is_none());
    }

    #[test]
    fn no_storage_by_default() {
        let client = JobClient::new("http://10.0.0.1", "alice", None);
        assert!(client.storage().is_none());
    }
}
