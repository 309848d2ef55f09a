//! Model-related error types.

use std::time::Duration;
use thiserror::Error;

/// The protocol step an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// `POST /session`.
    CreateSession,
    /// `POST /session/{id}/prompt`.
    SubmitPrompt,
    /// `GET /event`, before the first byte.
    OpenEventStream,
    /// `GET /event`, while reading frames.
    ReadEventStream,
    /// `DELETE /session/{id}`.
    DeleteSession,
    /// `GET /agent`.
    ListAgents,
    /// `GET /config/providers`.
    ListProviders,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::CreateSession => "create session",
            Step::SubmitPrompt => "submit prompt",
            Step::OpenEventStream => "open event stream",
            Step::ReadEventStream => "read event stream",
            Step::DeleteSession => "delete session",
            Step::ListAgents => "list agents",
            Step::ListProviders => "list providers",
        };
        f.write_str(name)
    }
}

/// Model-related errors.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Invalid construction parameters. Raised before any network activity.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Non-2xx response from the server.
    #[error("{step} failed: HTTP {status} - {body}")]
    Transport {
        /// Step that failed.
        step: Step,
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// A bounded call exceeded its deadline.
    #[error("{step} timed out after {duration:?}")]
    Timeout {
        /// Step that timed out.
        step: Step,
        /// Configured deadline.
        duration: Duration,
    },

    /// A success response was missing or malformed where it matters.
    #[error("{step} failed: protocol error: {message}")]
    Protocol {
        /// Step that failed.
        step: Step,
        /// What was wrong.
        message: String,
    },

    /// Connection-level failure.
    #[error("{step} failed: network error: {message}")]
    Network {
        /// Step that failed.
        step: Step,
        /// Underlying error text.
        message: String,
    },

    /// The caller cancelled the call.
    #[error("{0} cancelled")]
    Cancelled(Step),
}

impl ModelError {
    /// Check if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::Timeout { .. } => true,
            ModelError::Network { .. } => true,
            ModelError::Transport { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The step this error came from, when it has one.
    #[must_use]
    pub fn step(&self) -> Option<Step> {
        match self {
            ModelError::Transport { step, .. }
            | ModelError::Timeout { step, .. }
            | ModelError::Protocol { step, .. }
            | ModelError::Network { step, .. }
            | ModelError::Cancelled(step) => Some(*step),
            ModelError::Configuration(_) => None,
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a transport error.
    pub fn transport(step: Step, status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            step,
            status,
            body: body.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(step: Step, duration: Duration) -> Self {
        Self::Timeout { step, duration }
    }

    /// Create a protocol error.
    pub fn protocol(step: Step, message: impl Into<String>) -> Self {
        Self::Protocol {
            step,
            message: message.into(),
        }
    }

    /// Classify a reqwest error raised during `step`.
    ///
    /// `deadline` is reported if reqwest itself timed out.
    pub fn from_reqwest(step: Step, err: reqwest::Error, deadline: Duration) -> Self {
        if err.is_timeout() {
            ModelError::timeout(step, deadline)
        } else if let Some(status) = err.status() {
            ModelError::transport(step, status.as_u16(), err.to_string())
        } else {
            ModelError::Network {
                step,
                message: err.to_string(),
            }
        }
    }
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(ModelError::timeout(Step::SubmitPrompt, Duration::from_secs(30)).is_retryable());
        assert!(ModelError::transport(Step::CreateSession, 503, "down").is_retryable());
        assert!(ModelError::Network {
            step: Step::ReadEventStream,
            message: "reset".into()
        }
        .is_retryable());

        assert!(!ModelError::transport(Step::CreateSession, 400, "bad").is_retryable());
        assert!(!ModelError::protocol(Step::CreateSession, "no id").is_retryable());
        assert!(!ModelError::configuration("bad url").is_retryable());
        assert!(!ModelError::Cancelled(Step::ReadEventStream).is_retryable());
    }

    #[test]
    fn test_error_display_names_step() {
        let err = ModelError::transport(Step::SubmitPrompt, 500, "boom");
        assert_eq!(err.to_string(), "submit prompt failed: HTTP 500 - boom");

        let err = ModelError::timeout(Step::SubmitPrompt, Duration::from_secs(30));
        assert_eq!(err.to_string(), "submit prompt timed out after 30s");

        let err = ModelError::protocol(Step::CreateSession, "missing session id");
        assert!(err.to_string().contains("create session"));
        assert!(err.to_string().contains("missing session id"));
    }

    #[test]
    fn test_step_accessor() {
        assert_eq!(
            ModelError::Cancelled(Step::OpenEventStream).step(),
            Some(Step::OpenEventStream)
        );
        assert_eq!(ModelError::configuration("x").step(), None);
    }
}
