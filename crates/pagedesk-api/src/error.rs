use thiserror::Error;

/// Failures surfaced by the backend gateway. None of them are fatal; the
/// worst case is a redirect to the login page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Token missing or rejected. The session must be cleared.
    #[error("session missing or rejected")]
    Unauthorized,

    /// Local input check failed; no request was made.
    #[error("{0}")]
    Validation(String),

    /// Transport failure or a non-2xx response.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Credential exchange refused, carrying the backend's reason.
    #[error("{0}")]
    Rejected(String),

    /// 2xx response whose body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}
