//! sessionkit core - authentication session lifecycle.
//!
//! The [`auth::AuthContainer`] owns the login state and applies four
//! transitions (restore, login, logout, update photo) against three
//! collaborators:
//!
//! - a [`store::SessionStore`] holding the serialized session under one key
//! - an [`api::AuthGateway`] that checks credentials
//! - a [`notify::Notifier`] that shows messages to the user
//!
//! [`config::Config`] picks the concrete backends.

pub mod api;
pub mod auth;
pub mod config;
pub mod notify;
pub mod store;

pub use api::{AuthGateway, GatewayResponse};
pub use auth::{AuthContainer, AuthError, AuthState, Credentials, Transition, UserSession, SESSION_KEY};
pub use config::{Config, SoftFailurePolicy};
pub use notify::{ChannelNotifier, Notifier, TracingNotifier};
pub use store::{SessionStore, StoreError};
