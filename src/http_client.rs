use serde_json::Value;
use std::sync::Arc;

use crate::auth::{authenticate, CredentialStore, RefreshCoordinator, SessionController};
use crate::error::ApiError;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// HTTP client for the storefront API with transparent token refresh
///
/// Feature code sends requests as if authentication did not exist: the
/// current credentials are attached automatically, and an expired-session 401
/// is recovered by a single shared refresh followed by one replay.
pub struct ApiClient {
    /// Underlying transport, shared with the refresh exchange
    transport: Arc<dyn Transport>,

    /// Source of the credentials attached to each request
    store: Arc<CredentialStore>,

    /// Single-flight refresh protocol
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a new client
    pub fn new(transport: Arc<dyn Transport>, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            transport,
            store: coordinator.store().clone(),
            coordinator,
        }
    }

    /// Execute an authenticated request
    ///
    /// Returns the response for 2xx statuses and `ApiError::Status` for any
    /// other status. A refresh-eligible 401 is replayed exactly once with the
    /// refreshed credentials; if the refresh itself fails the caller gets the
    /// refresh error instead of the 401.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let mut request = request;

        let credentials = self.store.read_all().await;
        let (outgoing, sent_token) = authenticate(request.clone(), credentials.as_ref());

        let response = self.transport.send(outgoing).await?;
        if response.is_success() {
            return Ok(response);
        }

        if !self.coordinator.is_refresh_eligible(&request, &response) {
            tracing::debug!(
                request_id = %request_id,
                method = %request.method,
                path = %request.path,
                status = response.status.as_u16(),
                "Request failed"
            );
            return Err(ApiError::Status(response));
        }

        tracing::info!(
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            "Session expired, waiting for token refresh"
        );

        request.mark_retried();
        let fresh = self
            .coordinator
            .refreshed_credentials(sent_token.as_deref())
            .await?;

        let (replay, _) = authenticate(request, Some(&fresh));
        tracing::debug!(request_id = %request_id, path = %replay.path, "Replaying request");

        let response = self.transport.send(replay).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status(response))
        }
    }

    /// Execute a request without credentials or refresh handling
    pub async fn send_unauthenticated(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.transport.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status(response))
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<ApiResponse, ApiError> {
        let mut request = ApiRequest::post(path);
        request.body = body;
        self.send(request).await
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn session(&self) -> &Arc<SessionController> {
        self.coordinator.session()
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }
}
