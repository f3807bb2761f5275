use std::fmt;

/// Maximum length for username input.
/// Usernames are typically email addresses, 50 chars covers most.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Login form payload.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Persist the session so it survives an app restart
    pub keep: bool,
}

// Password is never printed
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("keep", &self.keep)
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            keep: false,
        }
    }

    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Check the form before it goes anywhere near the gateway.
    /// Returns the user-facing message on failure.
    pub fn validate(&self) -> Result<(), String> {
        let username = self.username.trim();
        if username.is_empty() || self.password.is_empty() {
            return Err("Username and password required".to_string());
        }
        if username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(format!("Username must be at most {} characters", MAX_USERNAME_LENGTH));
        }
        if self.password.chars().count() > MAX_PASSWORD_LENGTH {
            return Err(format!("Password must be at most {} characters", MAX_PASSWORD_LENGTH));
        }
        if !username.chars().all(is_valid_input_char) || !self.password.chars().all(is_valid_input_char) {
            return Err("Username and password may not contain control characters".to_string());
        }
        Ok(())
    }
}

fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}
