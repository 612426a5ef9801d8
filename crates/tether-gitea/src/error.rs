//! Error types for tether-gitea.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the git-hosting API.
///
/// Business outcomes (conflicts, nothing to merge) are never errors; they are
/// reported through [`crate::SyncStatus`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server rejected the token.
    #[error("authentication failed - check the access token for this server")]
    AuthenticationFailed,

    /// Token not found.
    #[error("no access token found - pass --token or set TETHER_TOKEN")]
    NoToken,

    /// API rate limit exceeded.
    #[error("API rate limit exceeded - wait and try again")]
    RateLimited,

    /// Repository not found or no access.
    #[error("repository not found or no access: {0}")]
    RepoNotFound(String),

    /// API error with status code.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Network error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("failed to parse API response: {0}")]
    Parse(#[from] serde_json::Error),
}
