// Request authenticator
// Attaches the bearer token and session id to outgoing requests

use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};

use super::types::CredentialSet;
use crate::transport::ApiRequest;

/// Header correlating a request with its login session
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Attach credentials to a request
///
/// Returns the request together with the access token that was attached, if
/// any. Without credentials the request goes out unauthenticated. Never
/// fails: a credential that is not a valid header value is skipped.
pub fn authenticate(
    mut request: ApiRequest,
    credentials: Option<&CredentialSet>,
) -> (ApiRequest, Option<String>) {
    let Some(credentials) = credentials.filter(|c| !c.access_token.is_empty()) else {
        return (request, None);
    };

    match HeaderValue::from_str(&format!("Bearer {}", credentials.access_token)) {
        Ok(value) => {
            request.headers.insert(AUTHORIZATION, value);
        }
        Err(_) => {
            tracing::warn!("Access token is not a valid header value, sending unauthenticated");
            return (request, None);
        }
    }

    if !credentials.session_id.is_empty() {
        match HeaderValue::from_str(&credentials.session_id) {
            Ok(value) => {
                request
                    .headers
                    .insert(HeaderName::from_static(SESSION_ID_HEADER), value);
            }
            Err(_) => tracing::warn!("Session id is not a valid header value, omitting it"),
        }
    }

    (request, Some(credentials.access_token.clone()))
}
