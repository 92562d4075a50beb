/// Failure of a single outbound send attempt, pre-classified by the platform
/// adapter so the delivery layer never has to inspect provider error strings.
///
/// Permanent variants are certain to recur on retry and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Destination identifier is malformed or unknown to the platform.
    #[error("invalid destination: {detail}")]
    InvalidDestination { detail: String },

    /// Platform credentials were rejected.
    #[error("authentication failed: {detail}")]
    Unauthorized { detail: String },

    /// The platform refused the send (e.g. user blocked the bot).
    #[error("permission denied: {detail}")]
    PermissionDenied { detail: String },

    /// Anything that may succeed on a later attempt: network errors,
    /// timeouts, 5xx responses, provider rate limits.
    #[error("transient send failure: {detail}")]
    Transient { detail: String },
}

impl SendError {
    #[must_use]
    pub fn invalid_destination(detail: impl std::fmt::Display) -> Self {
        Self::InvalidDestination {
            detail: detail.to_string(),
        }
    }

    #[must_use]
    pub fn unauthorized(detail: impl std::fmt::Display) -> Self {
        Self::Unauthorized {
            detail: detail.to_string(),
        }
    }

    #[must_use]
    pub fn permission_denied(detail: impl std::fmt::Display) -> Self {
        Self::PermissionDenied {
            detail: detail.to_string(),
        }
    }

    #[must_use]
    pub fn transient(detail: impl std::fmt::Display) -> Self {
        Self::Transient {
            detail: detail.to_string(),
        }
    }

    /// Permanent failures return immediately with no retry.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !matches!(self, Self::Transient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(SendError::invalid_destination("bad phone").is_permanent());
        assert!(SendError::unauthorized("bad token").is_permanent());
        assert!(SendError::permission_denied("blocked").is_permanent());
        assert!(!SendError::transient("timeout").is_permanent());
    }
}
