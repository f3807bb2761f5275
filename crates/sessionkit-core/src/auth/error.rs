use thiserror::Error;

/// Why a transition was rejected. None of these are fatal: the container
/// has already settled on "logged out" or "prior state" when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No stored session")]
    NotFound,

    #[error("Login rejected: {0}")]
    Unauthorized(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Session storage failed: {0}")]
    Storage(String),
}
