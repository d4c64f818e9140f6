// Storefront auth endpoints

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::CredentialSet;
use crate::error::ApiError;
use crate::http_client::ApiClient;
use crate::models::auth::{ActivationData, LoginData, LoginOutcome, ResetTokenData, User};
use crate::models::envelope::Envelope;
use crate::transport::{ApiRequest, ApiResponse};

/// Typed calls for login, logout, profile and the password/OTP flows
pub struct AuthApi {
    client: Arc<ApiClient>,
}

impl AuthApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Log in and persist the returned credential set
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let request = ApiRequest::post("/mobile/auth/login")
            .json(json!({ "email": email, "password": password }));
        let response = self.client.send_unauthenticated(request).await?;

        let data: LoginData = decode_data(&response)?;
        let email_verified = data.email_verified;

        self.client.store().save(CredentialSet::from(data)).await?;

        let session = self.client.session();
        session.set_authenticated(true);
        session.set_verified(email_verified);

        if email_verified {
            tracing::info!("Logged in");
        } else {
            tracing::info!("Logged in, email verification required");
        }

        Ok(LoginOutcome { email_verified })
    }

    /// End this session on the server
    ///
    /// Local credentials are cleared and the session logged out whether or
    /// not the server call succeeds.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self.client.post("/mobile/auth/logout", None).await;
        self.end_local_session().await;
        result.map(|_| ())
    }

    /// End every session of this user on the server
    pub async fn logout_all(&self) -> Result<(), ApiError> {
        let result = self.client.post("/mobile/auth/logout-all", None).await;
        self.end_local_session().await;
        result.map(|_| ())
    }

    pub async fn profile(&self) -> Result<User, ApiError> {
        let response = self.client.get("/auth/profile").await?;
        decode_data(&response)
    }

    pub async fn avatar(&self) -> Result<Value, ApiError> {
        let response = self.client.get("/auth/profile/avatar").await?;
        decode_data(&response)
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        self.client
            .post(
                "/auth/change-password",
                Some(json!({
                    "current_password": current_password,
                    "new_password": new_password,
                })),
            )
            .await?;
        Ok(())
    }

    /// Request a password-reset OTP; returns the reset token to pair with it
    pub async fn forgot_password(&self, email: &str) -> Result<ResetTokenData, ApiError> {
        let request =
            ApiRequest::post("/auth/otp/forget-password").json(json!({ "email": email }));
        let response = self.client.send_unauthenticated(request).await?;
        decode_data(&response)
    }

    pub async fn verify_reset_password_otp(&self, token: &str, otp: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("/auth/otp/verify-reset-password-otp")
            .json(json!({ "token": token, "otp": otp }));
        self.client.send_unauthenticated(request).await?;
        Ok(())
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        otp: &str,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::post("/auth/otp/reset-password")
            .query("token", token)
            .json(json!({ "new_password": new_password, "otp": otp }));
        self.client.send_unauthenticated(request).await?;
        Ok(())
    }

    /// Send an email-activation OTP; returns the activation token
    pub async fn send_activation_otp(&self, email: &str) -> Result<ActivationData, ApiError> {
        let request =
            ApiRequest::post("/auth/otp/send-activation-email").json(json!({ "email": email }));
        let response = self.client.send_unauthenticated(request).await?;
        decode_data(&response)
    }

    /// Confirm the activation OTP and mark the session verified
    pub async fn verify_email_otp(&self, token: &str, otp: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("/auth/otp/account-activation")
            .query("otp", otp)
            .query("token", token)
            .json(json!({}));
        self.client.send_unauthenticated(request).await?;
        self.client.session().set_verified(true);
        Ok(())
    }

    pub async fn health_check(&self) -> Result<Value, ApiError> {
        let response = self
            .client
            .send_unauthenticated(ApiRequest::get("/health-check"))
            .await?;
        response
            .json()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn end_local_session(&self) {
        if let Err(e) = self.client.store().clear().await {
            tracing::warn!(error = %e, "Failed to clear stored credentials");
        }
        self.client.session().logout();
    }
}

/// Extract `data` from a success envelope
fn decode_data<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, ApiError> {
    let envelope: Envelope<T> = response
        .json()
        .map_err(|e| ApiError::Decode(e.to_string()))?;
    envelope
        .data
        .ok_or_else(|| ApiError::Decode("response does not contain data".to_string()))
}
