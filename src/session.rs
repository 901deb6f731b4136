// src/session.rs
//! Per-request user identity.

use serde::{Deserialize, Serialize};

/// Identity of the signed-in user, passed explicitly to whatever needs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: String,
}

impl SessionContext {
    /// `None` for a blank id.
    pub fn new(user_id: impl Into<String>) -> Option<Self> {
        let user_id = user_id.into().trim().to_string();
        if user_id.is_empty() {
            None
        } else {
            Some(Self { user_id })
        }
    }
}
