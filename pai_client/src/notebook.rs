//! Submit a Jupyter notebook as a job.

use ::std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use ::pai_common::{
    anyhow::anyhow,
    config::{load_config, ClientConfig},
    error::{PaiError, Result},
    job::{staged_path, Job, ResourceOverrides},
    tracing::info,
};

use crate::client::{JobClient, DEFAULT_TOKEN_EXPIRATION_SECS};

/// What to run and where to stage it.
#[derive(Debug, Clone)]
pub struct NotebookJob {
    pub image: String,
    /// Remote root the script and `sources` are staged under.
    pub remote_root: String,
    pub resources: ResourceOverrides,
    /// Extra local files shipped with the script.
    pub sources: Vec<PathBuf>,
}

/// Convert `nb_file` to a python script next to it with `jupyter nbconvert`.
/// # Return
/// Path of the generated script.
pub fn convert_to_script(nb_file: &Path) -> Result<PathBuf> {
    if nb_file.extension().and_then(|ext| ext.to_str()) != Some("ipynb") {
        return Err(PaiError::validation(anyhow!(
            "{} is not a jupyter notebook",
            nb_file.display()
        )));
    }
    let file_name = nb_file
        .file_name()
        .ok_or_else(|| PaiError::validation(anyhow!("{} has no file name", nb_file.display())))?;
    let mut command = Command::new("jupyter");
    command
        .args(["nbconvert", "--to", "script"])
        .arg(file_name)
        .stdout(Stdio::null());
    if let Some(dir) = nb_file.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        command.current_dir(dir);
    }
    let status = command
        .status()
        .map_err(PaiError::fail_to_convert_notebook)?;
    if !status.success() {
        return Err(PaiError::fail_to_convert_notebook(anyhow!(
            "jupyter nbconvert {} exited with {}",
            nb_file.display(),
            status
        )));
    }
    Ok(nb_file.with_extension("py"))
}

/// Job name derived from a script path, without spaces.
pub fn job_name_of(script: &Path) -> String {
    script
        .file_stem()
        .map(|stem| stem.to_string_lossy().replace(' ', "_"))
        .unwrap_or_default()
}

/// Command running `script` from the staged code directory, which the container sees as `code/`.
pub fn script_command(script: &Path) -> String {
    format!("ipython \"{}\"", staged_path("code", script))
}

/// Build the job running `script`, with a unique name.
pub fn notebook_job(script: &Path, settings: NotebookJob) -> Job {
    let NotebookJob {
        image,
        remote_root,
        resources,
        mut sources,
    } = settings;
    let mut job = Job::simple(
        &job_name_of(script),
        image,
        script_command(script),
        resources,
        true,
    );
    sources.push(script.to_path_buf());
    job.add_source_files(sources, remote_root);
    job
}

/// Convert the notebook, then submit it with the client described by the JSON config at `config_path`.
/// # Return
/// URL of the job detail page.
pub fn submit_notebook(nb_file: &Path, config_path: &Path, settings: NotebookJob) -> Result<String> {
    let script = convert_to_script(nb_file)?;
    info!("Converted {} to {}", nb_file.display(), script.display());
    let config: ClientConfig = load_config(config_path)?;
    let mut client = JobClient::from_config(config)?;
    let mut job = notebook_job(&script, settings);
    client
        .acquire_token(DEFAULT_TOKEN_EXPIRATION_SECS)?
        .submit(&mut job, false)
}
