//! Authenticated identity as seen by the sync layer.
//!
//! Authentication itself belongs to the remote service; the core only reads
//! the identity shape to stamp ownership and authorship on writes.

use serde::{Deserialize, Serialize};

/// Label shown as author for guest sessions.
pub const GUEST_DISPLAY_NAME: &str = "Guest User";

/// Identity returned by the remote service for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque identity ID.
    pub id: String,
    /// Set for throwaway guest accounts.
    #[serde(default)]
    pub is_guest: bool,
    /// User-chosen name, when the account has one.
    #[serde(default)]
    pub username: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_guest: false,
            username: None,
        }
    }

    /// Creates a guest identity. Guests may still carry a generated username.
    pub fn guest(id: impl Into<String>) -> Self {
        Self {
            is_guest: true,
            ..Self::new(id)
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Resolves the author label written to `last_edited_by`.
    ///
    /// Guest flag wins over any username; an empty username falls back to
    /// the raw identity ID. Non-empty usernames are used as stored, without
    /// trimming.
    pub fn display_name(&self) -> String {
        if self.is_guest {
            return GUEST_DISPLAY_NAME.to_string();
        }
        match self.username.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.id.clone(),
        }
    }
}
