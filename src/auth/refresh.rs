// Refresh-token exchange

use reqwest::header::{HeaderName, HeaderValue};

use super::authenticator::SESSION_ID_HEADER;
use super::types::{CredentialSet, RefreshResponse};
use crate::error::RefreshError;
use crate::transport::{ApiRequest, Transport};

/// Endpoint that exchanges a refresh token for a new credential set
pub const REFRESH_PATH: &str = "/mobile/auth/refresh-token";

/// Header carrying the refresh token
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// Exchange the stored refresh token and session id for a new credential set
///
/// Credentials travel as headers, never in the body. Fails without contacting
/// the server when either credential is missing.
pub async fn exchange(
    transport: &dyn Transport,
    credentials: Option<&CredentialSet>,
) -> Result<CredentialSet, RefreshError> {
    let refresh_token = credentials
        .map(|c| c.refresh_token.as_str())
        .filter(|t| !t.is_empty())
        .ok_or(RefreshError::MissingRefreshToken)?;
    let session_id = credentials
        .map(|c| c.session_id.as_str())
        .filter(|s| !s.is_empty())
        .ok_or(RefreshError::MissingSessionId)?;

    tracing::info!("Refreshing access token...");

    let request = ApiRequest::post(REFRESH_PATH)
        .header(
            HeaderName::from_static(SESSION_ID_HEADER),
            header_value(session_id, "session id")?,
        )
        .header(
            HeaderName::from_static(REFRESH_TOKEN_HEADER),
            header_value(refresh_token, "refresh token")?,
        );

    let response = transport
        .send(request)
        .await
        .map_err(RefreshError::Network)?;

    let status = response.status.as_u16();
    let body: RefreshResponse = response.json().map_err(|e| {
        tracing::error!(status, body = %response.text(), "Unreadable refresh response");
        RefreshError::Rejected {
            status,
            message: format!("unreadable response body: {}", e),
        }
    })?;

    if !response.is_success() || !body.success {
        let message = body
            .error
            .as_ref()
            .or(body.message.as_ref())
            .map(|m| m.display())
            .unwrap_or_else(|| "server did not report success".to_string());
        tracing::error!(status, message = %message, "Failed to refresh token");
        return Err(RefreshError::Rejected { status, message });
    }

    let data = body.data.ok_or_else(|| RefreshError::Rejected {
        status,
        message: "response does not contain data".to_string(),
    })?;
    if data.access_token.is_empty() {
        return Err(RefreshError::Rejected {
            status,
            message: "response does not contain access_token".to_string(),
        });
    }

    Ok(CredentialSet::from(data))
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue, RefreshError> {
    HeaderValue::from_str(value).map_err(|_| RefreshError::InvalidHeader(what.to_string()))
}
