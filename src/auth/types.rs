// Authentication types

use serde::Deserialize;
use std::fmt;

use crate::models::auth::LoginData;
use crate::models::envelope::MessageField;
use crate::models::string_or_number;

/// Complete credential set
///
/// Always replaced or cleared as a whole; the expiries are advisory and kept
/// exactly as the server sent them.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSet {
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: String,
    pub access_expiry: String,
    pub refresh_expiry: String,
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("access_token", &token_preview(&self.access_token))
            .field("refresh_token", &token_preview(&self.refresh_token))
            .field("session_id", &self.session_id)
            .field("access_expiry", &self.access_expiry)
            .field("refresh_expiry", &self.refresh_expiry)
            .finish()
    }
}

impl From<LoginData> for CredentialSet {
    fn from(data: LoginData) -> Self {
        Self {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            session_id: data.session_id,
            access_expiry: data.expires_in_access_token,
            refresh_expiry: data.expires_in_refresh_token,
        }
    }
}

/// Refresh endpoint response body
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub success: bool,
    pub data: Option<RefreshData>,
    pub message: Option<MessageField>,
    pub error: Option<MessageField>,
}

/// `data` of a successful refresh
#[derive(Deserialize)]
pub struct RefreshData {
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub expires_in_access_token: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub expires_in_refresh_token: String,
}

impl fmt::Debug for RefreshData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshData")
            .field("access_token", &token_preview(&self.access_token))
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl From<RefreshData> for CredentialSet {
    fn from(data: RefreshData) -> Self {
        Self {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            session_id: data.session_id,
            access_expiry: data.expires_in_access_token,
            refresh_expiry: data.expires_in_refresh_token,
        }
    }
}

/// First characters of a secret, for logs
pub fn token_preview(token: &str) -> String {
    let preview: String = token.chars().take(8).collect();
    if preview.len() < token.len() {
        format!("{}...", preview)
    } else {
        preview
    }
}
