//! Registry of the actions a bootstrap step can name.

use ::std::collections::BTreeMap;

use ::pai_common::{
    anyhow,
    serde::de::DeserializeOwned,
    serde_json::{self, Map, Value},
};

/// Why a handler did not complete.
pub(crate) enum Failure {
    /// The step's arguments do not fit the handler's argument type.
    InvalidArguments(serde_json::Error),
    Execution(anyhow::Error),
}

type Handler = Box<dyn Fn(Map<String, Value>) -> Result<(), Failure>>;

/// Mapping from action name, e.g. `hdfs.download`, to a typed handler.
#[derive(Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, Handler>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler of that name.
    /// The named arguments of a step are decoded into `A` before the handler runs.
    pub fn register<A, F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        A: DeserializeOwned,
        F: Fn(A) -> anyhow::Result<()> + 'static,
    {
        let handler: Handler = Box::new(move |args| {
            let args = serde_json::from_value(Value::Object(args)).map_err(Failure::InvalidArguments)?;
            handler(args).map_err(Failure::Execution)
        });
        self.actions.insert(name.into(), handler);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Sorted names of the registered actions.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Handler> {
        self.actions.get(name)
    }
}
