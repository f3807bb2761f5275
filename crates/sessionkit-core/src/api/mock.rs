use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::{AuthGateway, GatewayResponse};
use crate::auth::UserSession;

/// Message returned for unknown users and wrong passwords alike.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";

struct Account {
    password: String,
    user: UserSession,
}

/// In-memory user directory standing in for a real auth service.
#[derive(Default)]
pub struct MockGateway {
    accounts: HashMap<String, Account>,
    calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory seeded with a couple of demo accounts
    pub fn with_demo_users() -> Self {
        Self::new()
            .with_user(
                "demo",
                "demo",
                UserSession::new("1", "Demo User", "https://i.pravatar.cc/300?u=demo")
                    .with_token("demo-token"),
            )
            .with_user(
                "admin",
                "admin",
                UserSession::new("2", "Administrator", "https://i.pravatar.cc/300?u=admin")
                    .with_token("admin-token"),
            )
    }

    pub fn with_user(mut self, username: &str, password: &str, user: UserSession) -> Self {
        self.accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                user,
            },
        );
        self
    }

    /// Number of login attempts that reached this gateway
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthGateway for MockGateway {
    async fn login(&self, username: &str, password: &str) -> GatewayResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.accounts.get(username.trim()) {
            Some(account) if account.password == password => {
                debug!(username, "Mock login accepted");
                GatewayResponse::success(account.user.clone())
            }
            _ => {
                debug!(username, "Mock login rejected");
                GatewayResponse::failure(INVALID_CREDENTIALS_MESSAGE)
            }
        }
    }
}
