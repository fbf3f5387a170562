//! Crate-wide error type and process exit codes.

use serde::{Deserialize, Serialize};

pub type ScenaristResult<T> = Result<T, ScenaristError>;

/// Framework-level faults. Test failures are NOT errors: they travel through
/// `TestError` values and end up in the scenario verdict instead.
#[derive(Debug, thiserror::Error)]
pub enum ScenaristError {
    /// Scenario or step definition problem (duplicate step, unresolvable
    /// goto target, malformed declaration sequence).
    #[error("definition error: {0}")]
    Definition(String),

    /// Scenario file could not be parsed or fails validation.
    #[error("scenario error: {0}")]
    Scenario(String),

    /// A lifecycle handler raised; a misbehaving observer must not silently
    /// corrupt reporting, so this aborts the run.
    #[error("handler error during {event}: {message}")]
    Handler { event: String, message: String },

    /// Report read/write problem.
    #[error("report error: {0}")]
    Report(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing input: {0}")]
    InputMissing(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ScenaristError {
    /// Process exit code this error maps to.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ScenaristError::Definition(_) | ScenaristError::Scenario(_) => {
                ErrorCode::InputFormatError
            }
            ScenaristError::InputMissing(_) => ErrorCode::InputMissingError,
            ScenaristError::InvalidArgument(_) => ErrorCode::ArgumentsError,
            ScenaristError::Io(_) => ErrorCode::EnvironmentError,
            ScenaristError::Config(_) => ErrorCode::EnvironmentError,
            ScenaristError::Handler { .. }
            | ScenaristError::Report(_)
            | ScenaristError::Json(_) => ErrorCode::InternalError,
        }
    }
}

/// Process exit codes. Codes below 256, grouped by tens:
/// 20-29 normal errors, 40-49 input errors, 50-59 internal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Success = 0,
    TestError = 21,
    EnvironmentError = 40,
    ArgumentsError = 41,
    InputMissingError = 42,
    InputFormatError = 43,
    InternalError = 50,
}

impl ErrorCode {
    pub fn exit_code(self) -> u8 {
        self as u8
    }

    /// Worst error code of a list; the higher the value, the worse.
    pub fn worst(codes: &[ErrorCode]) -> ErrorCode {
        codes.iter().copied().max().unwrap_or(ErrorCode::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_picks_highest_code() {
        assert_eq!(ErrorCode::worst(&[]), ErrorCode::Success);
        assert_eq!(
            ErrorCode::worst(&[ErrorCode::Success, ErrorCode::TestError]),
            ErrorCode::TestError
        );
        assert_eq!(
            ErrorCode::worst(&[
                ErrorCode::TestError,
                ErrorCode::InternalError,
                ErrorCode::ArgumentsError
            ]),
            ErrorCode::InternalError
        );
    }

    #[test]
    fn definition_errors_map_to_input_format() {
        let err = ScenaristError::Definition("no step named '040'".to_string());
        assert_eq!(err.error_code(), ErrorCode::InputFormatError);
    }
}
