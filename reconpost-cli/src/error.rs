//! CLI-specific error types and exit code mapping

use reconpost_core::error::{JobError, ReconError, ValidationError};

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// The scan request was rejected before a job was created.
    #[error("invalid scan request: {0}")]
    Validation(#[from] ValidationError),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                 |
    /// |------|-------------------------|
    /// | 0    | Success                 |
    /// | 1    | General / command error |
    /// | 2    | Configuration error     |
    /// | 3    | Invalid scan request    |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Validation(_) => 3,
            Self::Command(_) | Self::JsonSerialize(_) | Self::Io(_) => 1,
        }
    }
}

impl From<ReconError> for CliError {
    fn from(e: ReconError) -> Self {
        match e {
            ReconError::Config(inner) => Self::Config(inner.to_string()),
            ReconError::Validation(inner) => Self::Validation(inner),
            ReconError::Io(inner) => Self::Io(inner),
            other => Self::Command(other.to_string()),
        }
    }
}

impl From<JobError> for CliError {
    fn from(e: JobError) -> Self {
        Self::Command(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use reconpost_core::error::ConfigError;

    use super::*;

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_validation_error() {
        let err = CliError::from(ValidationError::EmptyTarget);
        assert_eq!(err.exit_code(), 3, "validation error should return exit code 3");
        assert_eq!(err.to_string(), "invalid scan request: target must not be empty");
    }

    #[test]
    fn test_exit_code_command_and_io_errors() {
        assert_eq!(CliError::Command("x".to_owned()).exit_code(), 1);
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        assert_eq!(CliError::Io(io_err).exit_code(), 1);
    }

    #[test]
    fn test_from_recon_config_error_keeps_inner_message() {
        let err = CliError::from(ReconError::Config(ConfigError::FileNotFound {
            path: "missing.toml".to_owned(),
        }));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.to_string(),
            "configuration error: config file not found: missing.toml"
        );
    }

    #[test]
    fn test_from_recon_validation_error() {
        let err = CliError::from(ReconError::Validation(ValidationError::UnknownTargetType(
            "url".to_owned(),
        )));
        assert!(matches!(err, CliError::Validation(_)));
    }

    #[test]
    fn test_from_job_error_is_command_error() {
        let err = CliError::from(JobError::NotFound { id: "abc".to_owned() });
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "scan not found: abc");
    }
}
