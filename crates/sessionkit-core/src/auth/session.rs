use serde::{Deserialize, Serialize};

/// Storage key the serialized session lives under.
pub const SESSION_KEY: &str = "@auth";

/// The user record returned by the gateway and persisted to the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserSession {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl UserSession {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            image: image.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Parse a stored session record
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Bearer token if the gateway issued one
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}
