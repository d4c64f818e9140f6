use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

use super::refresh;
use super::session::SessionController;
use super::store::CredentialStore;
use super::types::CredentialSet;
use crate::error::RefreshError;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Error text the server sends when an access token has expired
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again";

type Outcome = Result<CredentialSet, RefreshError>;
type Waiter = oneshot::Sender<Outcome>;

enum RefreshState {
    Idle,
    /// Exactly one exchange outstanding; every waiter receives its outcome
    Refreshing { waiters: Vec<Waiter> },
}

/// Refresh coordinator
/// Runs at most one refresh exchange at a time and settles every request
/// that failed with an expired token against that single outcome
pub struct RefreshCoordinator {
    /// Idle or refreshing, with the queue of waiters
    state: Mutex<RefreshState>,

    /// Credential set read for the exchange and replaced when it settles
    store: Arc<CredentialStore>,

    /// Logged out when an exchange fails
    session: Arc<SessionController>,

    /// Undecorated transport used for the exchange itself
    transport: Arc<dyn Transport>,

    /// Exact error text that marks a 401 as refresh-eligible
    expired_message: String,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        session: Arc<SessionController>,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
            store,
            session,
            transport,
            expired_message: SESSION_EXPIRED_MESSAGE.to_string(),
        }
    }

    /// Override the expired-session text (servers localise it)
    pub fn with_expired_message(mut self, message: impl Into<String>) -> Self {
        self.expired_message = message.into();
        self
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    /// Whether a failed response should go through the refresh protocol
    pub fn is_refresh_eligible(&self, request: &ApiRequest, response: &ApiResponse) -> bool {
        is_refresh_eligible(
            response.status,
            request.is_retried(),
            &response.body,
            &self.expired_message,
        )
    }

    /// Whether an exchange is currently outstanding
    pub async fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock().await, RefreshState::Refreshing { .. })
    }

    /// Number of requests waiting on the outstanding exchange
    pub async fn waiting(&self) -> usize {
        match &*self.state.lock().await {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Credentials to replay a request with after an expired-token 401
    ///
    /// `sent_token` is the access token the failed request carried. If the
    /// store already holds a different token, a rotation has happened since
    /// the request went out and that token is returned without a new
    /// exchange. Otherwise the caller joins the outstanding exchange, starting
    /// one if none is running.
    ///
    /// The exchange runs in its own task: dropping this future abandons only
    /// this caller's place in the queue.
    pub async fn refreshed_credentials(
        self: &Arc<Self>,
        sent_token: Option<&str>,
    ) -> Result<CredentialSet, RefreshError> {
        let rx = {
            let mut state = self.state.lock().await;

            if let Some(current) = self.store.read_all().await {
                if sent_token != Some(current.access_token.as_str()) {
                    tracing::debug!("Access token already rotated, replaying without refresh");
                    return Ok(current);
                }
            }

            let (tx, rx) = oneshot::channel();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    waiters.push(tx);
                    tracing::debug!(waiters = waiters.len(), "Refresh in flight, request queued");
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing { waiters: vec![tx] };
                    let coordinator = Arc::clone(self);
                    tokio::spawn(async move { coordinator.run_exchange().await });
                }
            }
            rx
        };

        rx.await.unwrap_or(Err(RefreshError::Abandoned))
    }

    /// Perform the exchange and settle every waiter
    ///
    /// The exchange and the store update run in a child task. Whatever
    /// happens to the child, this task drains the queue and returns to
    /// `Idle`; a child that panics settles everyone with `Abandoned`.
    async fn run_exchange(self: Arc<Self>) {
        let worker = Arc::clone(&self);
        let outcome = match tokio::spawn(async move { worker.exchange_and_persist().await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Token refresh task did not complete");
                if let Err(e) = self.store.clear().await {
                    tracing::warn!(error = %e, "Failed to clear stored credentials");
                }
                Err(RefreshError::Abandoned)
            }
        };

        let waiters = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters } => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };

        match &outcome {
            Ok(_) => tracing::info!(waiters = waiters.len(), "Access token refreshed"),
            Err(e) => {
                tracing::error!(error = %e, waiters = waiters.len(), "Token refresh failed, logging out");
                self.session.logout();
            }
        }

        for waiter in waiters {
            if waiter.send(outcome.clone()).is_err() {
                tracing::debug!("Waiter went away before the refresh settled");
            }
        }
    }

    /// Exchange the stored credentials and replace or clear the stored set
    async fn exchange_and_persist(&self) -> Outcome {
        let credentials = self.store.read_all().await;
        let result = refresh::exchange(self.transport.as_ref(), credentials.as_ref()).await;

        let _state = self.state.lock().await;

        let outcome = match result {
            Ok(fresh) => match self.store.save(fresh.clone()).await {
                Ok(()) => Ok(fresh),
                Err(e) => Err(RefreshError::Storage(e.to_string())),
            },
            Err(e) => Err(e),
        };
        if outcome.is_err() {
            if let Err(e) = self.store.clear().await {
                tracing::warn!(error = %e, "Failed to clear stored credentials");
            }
        }
        outcome
    }
}

/// Refresh-eligibility rule
///
/// A response qualifies only when it is a 401, the request has not been
/// retried yet, and the body's `error` field equals `expired_message`
/// exactly. Every other 401 (bad credentials, permission denied, ...) passes
/// through untouched.
pub fn is_refresh_eligible(
    status: StatusCode,
    retried: bool,
    body: &[u8],
    expired_message: &str,
) -> bool {
    if status != StatusCode::UNAUTHORIZED || retried {
        return false;
    }

    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(|e| e == expired_message))
        .unwrap_or(false)
}
