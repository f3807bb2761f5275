//! Remote authentication gateway.
//!
//! The gateway validates credentials and answers with either a user record
//! or a human-readable message. Absence of the record is the only failure
//! signal the auth container looks at.
//!
//! - `MockGateway`: in-memory user directory
//! - `HttpGateway`: JSON over HTTP via reqwest

pub mod client;
pub mod error;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::UserSession;

pub use client::HttpGateway;
pub use error::GatewayError;
pub use mock::MockGateway;

/// Gateway answer: `data` on success, otherwise `message` explains why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    #[serde(default)]
    pub data: Option<UserSession>,
    #[serde(default)]
    pub message: Option<String>,
}

impl GatewayResponse {
    pub fn success(user: UserSession) -> Self {
        Self {
            data: Some(user),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            data: None,
            message: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> GatewayResponse;
}

#[async_trait]
impl<G: AuthGateway + ?Sized> AuthGateway for std::sync::Arc<G> {
    async fn login(&self, username: &str, password: &str) -> GatewayResponse {
        (**self).login(username, password).await
    }
}
