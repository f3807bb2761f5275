use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Unauthorized - invalid username or password")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl GatewayError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => GatewayError::Unauthorized,
            403 => GatewayError::AccessDenied(truncated),
            429 => GatewayError::RateLimited,
            500..=599 => GatewayError::ServerError(truncated),
            _ => GatewayError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Message suitable for the notification channel
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Unauthorized => "Invalid username or password".to_string(),
            GatewayError::AccessDenied(_) => "Access denied".to_string(),
            GatewayError::RateLimited => "Too many attempts. Please wait and try again.".to_string(),
            GatewayError::NetworkError(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            GatewayError::NetworkError(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            GatewayError::ServerError(_) | GatewayError::InvalidResponse(_) => {
                format!("Login failed: {}", self)
            }
        }
    }
}
