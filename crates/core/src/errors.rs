use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown {kind} `{value}` (expected {expected})")]
    UnknownLabel { kind: &'static str, value: String, expected: String },
    #[error("invalid burn configuration: {0}")]
    InvalidConfig(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Stable failure classes shared by the HTTP error body and CLI output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Validation,
    NotConfigured,
    Authentication,
    InvalidRequest,
    RateLimited,
    Timeout,
    Upstream,
    Parse,
    CostMismatch,
    Persistence,
    NotImplemented,
    Internal,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::NotConfigured => "not_configured",
            Self::Authentication => "authentication_error",
            Self::InvalidRequest => "invalid_request",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::Upstream => "agent_error",
            Self::Parse => "parsing_error",
            Self::CostMismatch => "cost_mismatch",
            Self::Persistence => "persistence_error",
            Self::NotImplemented => "not_implemented",
            Self::Internal => "internal_error",
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            Self::Validation => "The request could not be processed. Check inputs and try again.",
            Self::NotConfigured => "The agent runtime is not configured for this deployment.",
            Self::RateLimited => "The agent runtime is throttling requests. Please retry later.",
            Self::Timeout => "The agent runtime did not answer in time. Please retry shortly.",
            Self::Authentication
            | Self::InvalidRequest
            | Self::Upstream
            | Self::Parse
            | Self::CostMismatch => "The agent runtime returned an unusable answer.",
            Self::Persistence => "The service is temporarily unavailable. Please retry shortly.",
            Self::NotImplemented => "This operation is not implemented yet.",
            Self::Internal => "An unexpected internal error occurred.",
        }
    }

    /// Whether retrying the same request later can succeed.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout | Self::Upstream | Self::Persistence)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
