//! Run declarative bootstrap steps when a job container starts.
//!
//! A bootstrap file is a JSON array of steps:
//! ```json
//! [
//!     {"action": "hdfs.download", "hdfs_path": "/user/alice/conf.json", "local_path": "conf"},
//!     {"action": "common.run_commands", "commands": ["pip install -r conf/requirements.txt"]}
//! ]
//! ```
//! Steps run in order and the first failure stops the run. Nothing is rolled back.

use ::std::path::Path;

use ::pai_common::{
    anyhow::{self, anyhow},
    config::load_config,
    error::{PaiError, Result},
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    tracing::{info, info_span, Span},
};

pub mod actions;
mod registry;

pub use registry::ActionRegistry;
use registry::Failure;

/// One bootstrap step: the action to run and its named arguments.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(crate = "pai_common::serde")]
pub struct Step {
    pub action: String,
    #[serde(flatten)]
    pub args: Map<String, Value>,
}

/// Read the steps of a bootstrap file.
pub fn load_steps(path: impl AsRef<Path>) -> Result<Vec<Step>> {
    load_config(path)
}

pub struct BootstrapRunner {
    registry: ActionRegistry,
    span: Span,
}

impl BootstrapRunner {
    pub fn new(registry: ActionRegistry) -> Self {
        Self {
            registry,
            span: info_span!("bootstrap"),
        }
    }

    /// A runner knowing the actions of [actions::register_builtins].
    pub fn with_builtin_actions() -> Self {
        let mut registry = ActionRegistry::new();
        actions::register_builtins(&mut registry);
        Self::new(registry)
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Run `steps` in order, stopping at the first failure.
    pub fn run(&self, steps: &[Step]) -> Result<()> {
        let _guard = self.span.enter();
        for (index, Step { action, args }) in steps.iter().enumerate() {
            let handler = self.registry.get(action).ok_or_else(|| {
                PaiError::configuration(anyhow!("step {}: unknown action {}", index, action))
            })?;
            info!("Running step {}: {}", index, action);
            handler(args.clone()).map_err(|failure| match failure {
                Failure::InvalidArguments(e) => PaiError::configuration(
                    anyhow::Error::new(e)
                        .context(format!("step {}: invalid arguments of {}", index, action)),
                ),
                Failure::Execution(e) => PaiError::step_execution(
                    e.context(format!("step {}: action {} failed", index, action)),
                ),
            })?;
        }
        info!("Finished {} bootstrap steps", steps.len());
        Ok(())
    }

    pub fn run_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.run(&load_steps(path)?)
    }
}
