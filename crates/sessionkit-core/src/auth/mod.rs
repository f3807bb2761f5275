//! Authentication session lifecycle.
//!
//! This module provides:
//! - `AuthContainer`: owns `AuthState` and applies the four transitions
//!   (restore, login, logout, update photo)
//! - `UserSession`: the user record persisted under `SESSION_KEY`
//! - `Credentials`: login form payload with input validation

pub mod container;
pub mod credentials;
pub mod error;
pub mod session;
pub mod state;

pub use container::{AuthContainer, Transition};
pub use credentials::Credentials;
pub use error::AuthError;
pub use session::{UserSession, SESSION_KEY};
pub use state::AuthState;
