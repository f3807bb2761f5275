use serde::Serialize;

use super::UserSession;

/// In-memory login state.
///
/// `is_logged_in()` is true exactly when a user is present; the only
/// constructors are [`AuthState::logged_out`] and [`AuthState::logged_in`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AuthState {
    #[serde(rename = "isLoggedIn")]
    is_logged_in: bool,
    user: Option<UserSession>,
}

impl AuthState {
    pub fn logged_out() -> Self {
        Self::default()
    }

    pub fn logged_in(user: UserSession) -> Self {
        Self {
            is_logged_in: true,
            user: Some(user),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in
    }

    pub fn user(&self) -> Option<&UserSession> {
        self.user.as_ref()
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.user {
            Some(user) => write!(f, "logged in as {} ({})", user.display_name, user.id),
            None => write!(f, "logged out"),
        }
    }
}
