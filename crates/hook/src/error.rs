use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Terminal failures of a single hook invocation.
///
/// None of these are retried; the binary logs the error and exits with
/// [`HookError::exit_code`].
#[derive(Debug, Error)]
pub enum HookError {
    /// Missing or invalid environment fields supplied by the download manager
    #[error("invalid input: {0}")]
    Input(String),

    /// File size could not be read
    #[error("failed to read size of {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// Media duration could not be determined
    #[error("failed to read duration of {path}: {reason}")]
    Probe {
        path: PathBuf,
        reason: String,
        exit_code: Option<i32>,
    },

    /// The deferred-job queue could not be listed or parsed
    #[error("failed to query job queue: {reason}")]
    SchedulerQuery {
        reason: String,
        exit_code: Option<i32>,
    },

    /// The deferred-job scheduler rejected the conversion job
    #[error("failed to submit conversion job: {reason}")]
    Submission {
        reason: String,
        exit_code: Option<i32>,
    },
}

impl HookError {
    /// Process exit code for this failure.
    ///
    /// Propagates the external tool's exit code when there is one, otherwise 1.
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            HookError::Input(_) | HookError::Io { .. } => None,
            HookError::Probe { exit_code, .. }
            | HookError::SchedulerQuery { exit_code, .. }
            | HookError::Submission { exit_code, .. } => *exit_code,
        };
        match code {
            Some(c) if c != 0 => c,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, HookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_propagates_tool_status() {
        let err = HookError::SchedulerQuery {
            reason: "atq exited".to_string(),
            exit_code: Some(127),
        };
        assert_eq!(err.exit_code(), 127);

        let err = HookError::Probe {
            path: PathBuf::from("/tv/show.mkv"),
            reason: "no numeric duration".to_string(),
            exit_code: None,
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_internal_failures_exit_one() {
        assert_eq!(HookError::Input("missing path".to_string()).exit_code(), 1);

        let err = HookError::Io {
            path: PathBuf::from("/tv/show.mkv"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.exit_code(), 1);

        // A zero status paired with an error must never look like success
        let err = HookError::Submission {
            reason: "spawn failed".to_string(),
            exit_code: Some(0),
        };
        assert_eq!(err.exit_code(), 1);
    }
}
