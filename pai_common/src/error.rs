//! Errors shared by every paiclient crate.

use ::core::fmt::Display;
use ::std::error::Error;

pub type Result<T> = std::result::Result<T, PaiError>;

/// Kinds of failure surfaced to callers.
/// Callers usually retry [PaiErrorType::Connectivity] but never [PaiErrorType::Validation].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaiErrorType {
    /// Malformed or incomplete job descriptor.
    Validation,
    /// Token request rejected, or no token cached.
    Authentication,
    /// Transport failure: connection refused, timeout, DNS.
    Connectivity,
    /// Unexpected HTTP status when submitting or querying jobs.
    Submission,
    /// A source file failed to stage.
    Upload,
    /// Nested submission from inside a job container.
    Policy,
    /// Bootstrap step is unresolvable or its arguments are malformed.
    Configuration,
    /// Bootstrap step failed while running.
    StepExecution,
    /// WebHDFS request failed.
    Storage,
    NotImplemented,
    /// Notebook could not be converted to a script.
    FailToConvertNotebook,
    /// Missing or malformed environment variable.
    Environment,
    FailToLoadConfig,
}

impl Display for PaiErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Validation => "Validation error",
            Self::Authentication => "Authentication error",
            Self::Connectivity => "Connectivity error",
            Self::Submission => "Submission error",
            Self::Upload => "Upload error",
            Self::Policy => "Policy error",
            Self::Configuration => "Configuration error",
            Self::StepExecution => "Step execution error",
            Self::Storage => "Storage error",
            Self::NotImplemented => "Not implemented",
            Self::FailToConvertNotebook => "Fail to convert notebook",
            Self::Environment => "Environment error",
            Self::FailToLoadConfig => "Fail to load config",
        };
        write!(f, "{}", name)
    }
}

/// HTTP response whose status is not the one the caller expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnexpectedResponse {
    pub status: u16,
    pub body: String,
}

impl Display for UnexpectedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "status {}, body: {}", self.status, self.body)
    }
}

impl Error for UnexpectedResponse {}

#[derive(Debug)]
pub struct PaiError {
    error_type: PaiErrorType,
    cause: anyhow::Error,
}

macro_rules! define_error_constructors {
    ($($constructor: ident => $error_type: ident),* $(,)?) => {
        $(
            pub fn $constructor<E: Into<anyhow::Error>>(cause: E) -> Self {
                Self::new(PaiErrorType::$error_type, cause)
            }
        )*
    };
}

impl PaiError {
    pub fn new<E: Into<anyhow::Error>>(error_type: PaiErrorType, cause: E) -> Self {
        Self {
            error_type,
            cause: cause.into(),
        }
    }

    define_error_constructors!(
        validation => Validation,
        authentication => Authentication,
        connectivity => Connectivity,
        submission => Submission,
        upload => Upload,
        policy => Policy,
        configuration => Configuration,
        step_execution => StepExecution,
        storage => Storage,
        not_implemented => NotImplemented,
        fail_to_convert_notebook => FailToConvertNotebook,
        environment => Environment,
        fail_to_load_config => FailToLoadConfig,
    );

    pub fn get_error_type(&self) -> PaiErrorType {
        self.error_type
    }

    pub fn get_cause(&self) -> &anyhow::Error {
        &self.cause
    }

    /// The HTTP status and body, if this error was caused by an unexpected response.
    pub fn unexpected_response(&self) -> Option<&UnexpectedResponse> {
        self.cause.downcast_ref::<UnexpectedResponse>()
    }
}

impl Display for PaiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:#}", self.error_type, self.cause)
    }
}

/// The cause chain is already part of [Display], so no source is reported.
impl Error for PaiError {}

impl<T> From<PaiError> for Result<T> {
    fn from(val: PaiError) -> Self {
        Result::Err(val)
    }
}
