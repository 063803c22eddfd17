use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetouchError {
    /// Rejected before any network call; no state was mutated.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Network failure or a non-2xx response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The bounded wait on a remote call expired.
    #[error("request timed out")]
    Timeout,
    /// Malformed response body or undecodable image payload.
    #[error("invalid response: {0}")]
    Decode(String),
    /// The service answered well-formed but declined the edit.
    #[error("edit rejected: {0}")]
    Rejected(String),
    /// A completion arrived after its work list was superseded. Suppressed
    /// inside the scheduler; never user-visible.
    #[error("stale session")]
    StaleSession,
}

pub type Result<T> = std::result::Result<T, RetouchError>;
