use ::serde::{Deserialize, Serialize};
use ::serde_json::{Map, Value};
use ::tracing::warn;

/// Wire names of the fields [TaskRole] holds itself.
const TYPED_FIELDS: [&str; 6] = [
    "name",
    "command",
    "taskNumber",
    "cpuNumber",
    "gpuNumber",
    "memoryMB",
];

/// One role of a job: a command run by `task_number` identical containers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRole {
    pub name: String,
    pub command: String,
    pub task_number: u32,
    pub cpu_number: u32,
    pub gpu_number: u32,
    #[serde(rename = "memoryMB")]
    pub memory_mb: u32,
    /// Any other task role field accepted by the cluster, e.g. `shmMB`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskRole {
    /// Build a task role from the minimal resources, with `overrides` taking precedence.
    /// Extra fields named like a typed field are dropped.
    pub fn new(name: String, command: String, overrides: ResourceOverrides) -> Self {
        let defaults = Resources::minimal();
        let mut extra = overrides.extra;
        for field in TYPED_FIELDS {
            if let Some(value) = extra.remove(field) {
                warn!("Ignoring extra field {}={} of task role {}", field, value, name);
            }
        }
        Self {
            name,
            command,
            task_number: overrides.task_number.unwrap_or(defaults.task_number),
            cpu_number: overrides.cpu_number.unwrap_or(defaults.cpu_number),
            gpu_number: overrides.gpu_number.unwrap_or(defaults.gpu_number),
            memory_mb: overrides.memory_mb.unwrap_or(defaults.memory_mb),
            extra,
        }
    }
}

/// Resources of a single task role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resources {
    pub task_number: u32,
    pub cpu_number: u32,
    pub gpu_number: u32,
    pub memory_mb: u32,
}

impl Resources {
    /// Safe minimum for a task role: one task, 4 CPUs, no GPU, 8 GB memory.
    pub fn minimal() -> Self {
        Self {
            task_number: 1,
            cpu_number: 4,
            gpu_number: 0,
            memory_mb: 8192,
        }
    }
}

/// Caller supplied resources, merged over [Resources::minimal].
/// Uses the same field names as [TaskRole] on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_number: Option<u32>,
    #[serde(
        rename = "memoryMB",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub memory_mb: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResourceOverrides {
    pub fn task_number(mut self, task_number: u32) -> Self {
        self.task_number = Some(task_number);
        self
    }

    pub fn cpu_number(mut self, cpu_number: u32) -> Self {
        self.cpu_number = Some(cpu_number);
        self
    }

    pub fn gpu_number(mut self, gpu_number: u32) -> Self {
        self.gpu_number = Some(gpu_number);
        self
    }

    pub fn memory_mb(mut self, memory_mb: u32) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }

    /// Set a task role field that has no dedicated setter.
    /// Resource fields given here go to their setter when `value` is a `u32`.
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        let number = value.as_u64().and_then(|n| u32::try_from(n).ok());
        match (key.as_str(), number) {
            ("taskNumber", Some(n)) => self.task_number(n),
            ("cpuNumber", Some(n)) => self.cpu_number(n),
            ("gpuNumber", Some(n)) => self.gpu_number(n),
            ("memoryMB", Some(n)) => self.memory_mb(n),
            _ => {
                self.extra.insert(key, value);
                self
            }
        }
    }
}
