use ::std::path::PathBuf;

use ::clap::{Parser, Subcommand};
use ::pai_client::{
    client::DEFAULT_TOKEN_EXPIRATION_SECS,
    notebook::{submit_notebook, NotebookJob},
    JobClient,
};
use ::pai_common::{
    config::{load_config, ClientConfig},
    error::{PaiError, Result},
    job::{Job, ResourceOverrides},
    serde_json,
    tracing::info,
    tracing_subscriber,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Command line client of OpenPAI.
struct Args {
    /// path to the client config file
    #[arg(long)]
    config_path: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a job described by a JSON file
    Submit {
        job_path: PathBuf,
        /// local file to stage with the job, can be repeated
        #[arg(long = "source")]
        sources: Vec<PathBuf>,
        /// remote root the sources are staged under
        #[arg(long, default_value = "")]
        code_root: String,
        /// allow submitting from inside a job container
        #[arg(long)]
        allow_nested: bool,
    },
    /// List the jobs of the user
    Jobs {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        names_only: bool,
    },
    /// Convert a notebook to a script and submit it
    Notebook {
        nb_path: PathBuf,
        #[arg(long)]
        image: String,
        #[arg(long)]
        remote_root: String,
        /// resource overrides as JSON, e.g. '{"gpuNumber": 1}'
        #[arg(long)]
        resources: Option<String>,
        #[arg(long = "source")]
        sources: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    // setup tracing
    tracing_subscriber::fmt::init();

    let Args {
        config_path,
        command,
    } = Args::parse();

    match command {
        Commands::Submit {
            job_path,
            sources,
            code_root,
            allow_nested,
        } => {
            let config: ClientConfig = load_config(&config_path)?;
            let mut client = JobClient::from_config(config)?;
            let mut job: Job = load_config(&job_path)?;
            if !sources.is_empty() {
                job.add_source_files(sources, code_root);
            }
            let url = client
                .acquire_token(DEFAULT_TOKEN_EXPIRATION_SECS)?
                .submit(&mut job, allow_nested)?;
            info!("Job {} submitted", job.name);
            println!("{}", url);
        }
        Commands::Jobs { name, names_only } => {
            let config: ClientConfig = load_config(&config_path)?;
            let authenticate = config.passwd.is_some();
            let mut client = JobClient::from_config(config)?;
            if authenticate {
                client.acquire_token(DEFAULT_TOKEN_EXPIRATION_SECS)?;
            }
            if names_only {
                for name in client.list_job_names(name.as_deref())? {
                    println!("{}", name);
                }
            } else {
                let jobs = client.list_jobs(name.as_deref())?;
                let output =
                    serde_json::to_string_pretty(&jobs).map_err(PaiError::submission)?;
                println!("{}", output);
            }
        }
        Commands::Notebook {
            nb_path,
            image,
            remote_root,
            resources,
            sources,
        } => {
            let resources: ResourceOverrides = match resources {
                Some(resources) => {
                    serde_json::from_str(&resources).map_err(PaiError::validation)?
                }
                None => ResourceOverrides::default(),
            };
            let url = submit_notebook(
                &nb_path,
                &config_path,
                NotebookJob {
                    image,
                    remote_root,
                    resources,
                    sources,
                },
            )?;
            println!("{}", url);
        }
    }
    Ok(())
}
