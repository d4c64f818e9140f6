// Shared helpers for integration tests
//
// `FakeApi` is an in-process storefront backend. Protected endpoints accept
// only the currently valid access token and answer everything else with the
// expired-session 401. The refresh endpoint can be held behind a gate so tests
// control exactly when the exchange settles.

#![allow(dead_code)]

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use storefront_client::auth::{
    CredentialSet, CredentialStore, RefreshCoordinator, SessionController, SessionState,
    REFRESH_PATH, SESSION_EXPIRED_MESSAGE,
};
use storefront_client::error::StorageError;
use storefront_client::http_client::ApiClient;
use storefront_client::storage::{MemoryStorage, SecureStorage};
use storefront_client::transport::{ApiRequest, ApiResponse, Transport, TransportError};

/// How the fake answers the refresh endpoint
#[derive(Clone)]
pub enum RefreshReply {
    /// Issue a new credential set and start accepting its access token
    Rotate {
        access_token: &'static str,
        refresh_token: &'static str,
        session_id: &'static str,
    },
    /// Answer with a fixed status and body
    Body(StatusCode, &'static str),
    /// Fail at the transport level
    Fail(TransportError),
    /// Crash inside the transport
    Panic,
}

pub struct FakeApi {
    valid_token: Mutex<String>,
    refresh_reply: Mutex<RefreshReply>,
    gate: Option<Semaphore>,
    reject_all: AtomicBool,
    log: Mutex<Vec<ApiRequest>>,
}

impl FakeApi {
    pub fn new(valid_token: &str, refresh_reply: RefreshReply) -> Self {
        Self {
            valid_token: Mutex::new(valid_token.to_string()),
            refresh_reply: Mutex::new(refresh_reply),
            gate: None,
            reject_all: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Hold every refresh exchange until `release` is called
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Let one held refresh exchange complete
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Reject every token from now on, including freshly issued ones
    pub fn reject_all(&self) {
        self.reject_all.store(true, Ordering::SeqCst);
    }

    /// Expire the currently valid token
    pub fn expire_tokens(&self) {
        self.valid_token.lock().unwrap().clear();
    }

    pub fn set_refresh_reply(&self, reply: RefreshReply) {
        *self.refresh_reply.lock().unwrap() = reply;
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path == REFRESH_PATH)
            .count()
    }

    /// Requests to `path` other than the refresh endpoint, in arrival order
    pub fn calls_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for FakeApi {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.log.lock().unwrap().push(request.clone());

        if request.path == REFRESH_PATH {
            if let Some(gate) = &self.gate {
                let permit = gate.acquire().await.expect("gate closed");
                permit.forget();
            }

            let reply = self.refresh_reply.lock().unwrap().clone();
            return match reply {
                RefreshReply::Rotate {
                    access_token,
                    refresh_token,
                    session_id,
                } => {
                    *self.valid_token.lock().unwrap() = access_token.to_string();
                    let body = json!({
                        "success": true,
                        "data": {
                            "access_token": access_token,
                            "refresh_token": refresh_token,
                            "session_id": session_id,
                            "expires_in_access_token": "15m",
                            "expires_in_refresh_token": "7d",
                        }
                    });
                    Ok(ApiResponse::new(StatusCode::OK, body.to_string()))
                }
                RefreshReply::Body(status, body) => Ok(ApiResponse::new(status, body)),
                RefreshReply::Fail(err) => Err(err),
                RefreshReply::Panic => panic!("refresh backend crashed"),
            };
        }

        if request.path == "/forbidden" {
            let body = json!({ "statusCode": 401, "error": "Permission denied" });
            return Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, body.to_string()));
        }

        let valid = self.valid_token.lock().unwrap().clone();
        let accepted = !self.reject_all.load(Ordering::SeqCst)
            && !valid.is_empty()
            && request.bearer_token() == Some(valid.as_str());

        if accepted {
            let body = json!({ "success": true, "data": { "path": request.path } });
            Ok(ApiResponse::new(StatusCode::OK, body.to_string()))
        } else {
            Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, expired_body()))
        }
    }
}

/// In-memory storage whose writes can be switched to fail
#[derive(Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_writes: AtomicBool,
}

impl FlakyStorage {
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

impl SecureStorage for FlakyStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key)
    }

    fn set_items(&self, items: &[(&str, &str)]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.set_items(items)
    }

    fn delete_items(&self, keys: &[&str]) -> Result<(), StorageError> {
        self.inner.delete_items(keys)
    }
}

pub fn expired_body() -> String {
    json!({ "statusCode": 401, "error": SESSION_EXPIRED_MESSAGE }).to_string()
}

pub fn credentials(access: &str, refresh: &str, session: &str) -> CredentialSet {
    CredentialSet {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        session_id: session.to_string(),
        access_expiry: "15m".to_string(),
        refresh_expiry: "7d".to_string(),
    }
}

pub fn rotate_to_tok2() -> RefreshReply {
    RefreshReply::Rotate {
        access_token: "tok2",
        refresh_token: "ref2",
        session_id: "sess-2",
    }
}

/// Everything a test needs to drive and inspect one client
pub struct Harness {
    pub api: Arc<FakeApi>,
    pub client: Arc<ApiClient>,
    pub store: Arc<CredentialStore>,
    pub session: Arc<SessionController>,
}

impl Harness {
    /// Logged-in client holding `tok1` / `ref1` / `sess-1`
    pub async fn new(api: FakeApi) -> Self {
        Self::with_credentials(api, credentials("tok1", "ref1", "sess-1")).await
    }

    pub async fn with_credentials(api: FakeApi, stored: CredentialSet) -> Self {
        Self::with_storage(api, stored, Arc::new(MemoryStorage::new())).await
    }

    pub async fn with_storage(
        api: FakeApi,
        stored: CredentialSet,
        storage: Arc<dyn SecureStorage>,
    ) -> Self {
        let api = Arc::new(api);
        let store = Arc::new(CredentialStore::open(storage).unwrap());
        store.save(stored).await.unwrap();

        let session = Arc::new(SessionController::with_state(SessionState {
            is_authenticated: true,
            is_verified: true,
        }));

        let transport: Arc<dyn Transport> = api.clone();
        let coordinator = Arc::new(RefreshCoordinator::new(
            transport.clone(),
            store.clone(),
            session.clone(),
        ));
        let client = Arc::new(ApiClient::new(transport, coordinator));

        Self {
            api,
            client,
            store,
            session,
        }
    }

    /// Wait until `n` requests are queued behind the outstanding refresh
    pub async fn wait_for_waiters(&self, n: usize) {
        let coordinator = self.client.coordinator();
        tokio::time::timeout(Duration::from_secs(5), async {
            while coordinator.waiting().await < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("requests did not queue behind the refresh");
    }
}
