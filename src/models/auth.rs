// Auth endpoint payloads

use serde::Deserialize;

use super::string_or_number;

/// `data` of a successful login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub expires_in_access_token: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub expires_in_refresh_token: String,
    #[serde(default)]
    pub email_verified: bool,
}

/// Result of a login, as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginOutcome {
    pub email_verified: bool,
}

/// `data` of a forgot-password request
#[derive(Debug, Clone, Deserialize)]
pub struct ResetTokenData {
    #[serde(rename = "resetToken")]
    pub reset_token: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub expires_in: String,
}

/// `data` of a send-activation-email request
#[derive(Debug, Clone, Deserialize)]
pub struct ActivationData {
    pub activation_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Blocked,
    Pending,
}

/// Profile of the logged-in user
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub role_name: String,
    pub status: Option<UserStatus>,
    #[serde(default)]
    pub email_verified: bool,
    pub avatar: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
}
