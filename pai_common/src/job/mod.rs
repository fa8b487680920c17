//! Job descriptor in the OpenPAI v1 submission format.

use ::std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use ::anyhow::anyhow;
use ::serde::{Deserialize, Serialize};
use ::serde_json::{Map, Value};

use crate::error::{PaiError, Result};

mod task_role;

pub use task_role::{ResourceOverrides, Resources, TaskRole};

/// Name of the task role created by [Job::simple].
pub const MAIN_TASK_ROLE: &str = "main";

/// Mutable builder of a job's configuration.
/// Serializes to the flat JSON body accepted by the job submission endpoint;
/// the source file list is local state and never leaves the process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(rename = "jobName")]
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub code_dir: String,
    #[serde(default)]
    pub data_dir: String,
    #[serde(default)]
    pub output_dir: String,
    #[serde(default)]
    pub task_roles: Vec<TaskRole>,
    #[serde(default)]
    pub job_envs: BTreeMap<String, String>,
    /// Top level fields without a dedicated member, e.g. `retryCount`.
    #[serde(flatten)]
    pub extras: Map<String, Value>,
    /// Local files uploaded to storage when the job is submitted.
    #[serde(skip)]
    pub sources: Vec<PathBuf>,
    /// Remote root under which `sources` are staged.
    #[serde(skip)]
    pub code_root: String,
}

impl Job {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            code_dir: String::new(),
            data_dir: String::new(),
            output_dir: String::new(),
            task_roles: Vec::new(),
            job_envs: BTreeMap::new(),
            extras: Map::new(),
            sources: Vec::new(),
            code_root: String::new(),
        }
    }

    /// A job with a single task role named [MAIN_TASK_ROLE].
    /// With `use_uuid`, a random hex suffix is appended to `name`,
    /// so that submitting the same script twice does not collide.
    pub fn simple(
        name: &str,
        image: impl Into<String>,
        command: impl Into<String>,
        resources: ResourceOverrides,
        use_uuid: bool,
    ) -> Self {
        let name = if use_uuid {
            format!("{}_{}", name, random_suffix())
        } else {
            name.to_owned()
        };
        let mut job = Self::new(name, image);
        job.add_task_role(MAIN_TASK_ROLE, command, resources);
        job
    }

    /// Append a task role. Names are not checked for uniqueness here.
    pub fn add_task_role(
        &mut self,
        name: impl Into<String>,
        command: impl Into<String>,
        overrides: ResourceOverrides,
    ) -> &mut Self {
        self.task_roles
            .push(TaskRole::new(name.into(), command.into(), overrides));
        self
    }

    /// Append `files` to the sources and overwrite the code root.
    pub fn add_source_files<I, P>(&mut self, files: I, code_root: impl Into<String>) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.sources.extend(files.into_iter().map(Into::into));
        self.code_root = code_root.into();
        self
    }

    pub fn add_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.job_envs.insert(key.into(), value.into());
        self
    }

    /// Check the descriptor is complete enough to be submitted.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(PaiError::validation(anyhow!("jobName is required")));
        }
        if self.image.is_empty() {
            return Err(PaiError::validation(anyhow!(
                "image of job {} is required",
                self.name
            )));
        }
        if self.task_roles.is_empty() {
            return Err(PaiError::validation(anyhow!(
                "job {} has no task role",
                self.name
            )));
        }
        if !self.sources.is_empty() && self.code_root.is_empty() {
            return Err(PaiError::validation(anyhow!(
                "job {} has {} source files but no code root",
                self.name,
                self.sources.len()
            )));
        }
        Ok(())
    }

    /// Remote directory the sources are staged into: `{code_root}/{name}/code`.
    pub fn staging_dir(&self) -> String {
        format!(
            "{}/{}/code",
            self.code_root.trim_end_matches('/'),
            self.name
        )
    }
}

/// Remote path of a local source file under `staging_dir`.
/// Relative paths are kept as is, absolute ones lose their leading `/`.
pub fn staged_path(staging_dir: &str, file: &Path) -> String {
    let file = file.to_string_lossy();
    format!("{}/{}", staging_dir, file.trim_start_matches('/'))
}

fn random_suffix() -> String {
    format!("{:032x}", rand::random::<u128>())
}
