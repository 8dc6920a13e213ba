//! In-process transports and renewers for exercising the auth path

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use session_store::storage::StorageFuture;
use session_store::{ACCESS_TOKEN_KEY, Credential, CredentialStore, KeyValueStore, MemoryStorage};
use tokio::sync::Semaphore;
use transport::{Transport, TransportError, TransportRequest, TransportResponse};

use crate::connectivity::Connectivity;
use crate::coordinator::RefreshCoordinator;
use crate::dispatcher::{RequestDispatcher, Settings};
use crate::renewer::{RenewalError, Renewer};

pub const BASE_URL: &str = "http://api.test";

/// What the renewal endpoint answers.
#[derive(Debug, Clone, Copy)]
pub enum RenewalScript {
    /// 200 with `{"accessToken": token}`
    Token(&'static str),
    /// Bare status with an error body
    Status(u16),
    /// 200 with a raw body
    Body(&'static str),
    /// Transport-level connection failure
    Unreachable,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub authorization: Option<String>,
}

/// Fake API server.
///
/// - renewal path: answers per `RenewalScript`, optionally held until
///   `release_renewal` grants a permit
/// - `/auth/login`: 200 with token `T1` if the body contains `"good"`, else 401
/// - `/boom`: 500
/// - `/unreachable`: connection failure
/// - anything else: 200 if `Authorization: Bearer <valid_token>`, else 401
pub struct ScriptedTransport {
    valid_token: String,
    renewal: RenewalScript,
    gated: bool,
    gate: Semaphore,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(valid_token: &str, renewal: RenewalScript) -> Self {
        Self {
            valid_token: valid_token.to_string(),
            renewal,
            gated: false,
            gate: Semaphore::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Hold every renewal call until `release_renewal`.
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    pub fn release_renewal(&self, count: usize) {
        self.gate.add_permits(count);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn renewal_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.path == session_store::RENEWAL_PATH)
            .count()
    }

    /// Calls to business endpoints carrying `authorization`.
    pub fn calls_with(&self, authorization: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.authorization.as_deref() == Some(authorization))
            .count()
    }

    async fn renewal_response(&self) -> transport::Result<TransportResponse> {
        if self.gated {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;
            permit.forget();
        }
        match self.renewal {
            RenewalScript::Token(token) => Ok(TransportResponse::new(
                200,
                serde_json::json!({ "accessToken": token }).to_string(),
            )),
            RenewalScript::Status(status) => Ok(TransportResponse::new(
                status,
                r#"{"message":"refresh token invalid"}"#,
            )),
            RenewalScript::Body(body) => Ok(TransportResponse::new(200, body)),
            RenewalScript::Unreachable => {
                Err(TransportError::Connect("connection refused".into()))
            }
        }
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        request: TransportRequest,
    ) -> Pin<Box<dyn Future<Output = transport::Result<TransportResponse>> + Send + '_>> {
        Box::pin(async move {
            let path = request.path().to_string();
            let authorization = request
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.calls.lock().unwrap().push(RecordedCall {
                path: path.clone(),
                authorization: authorization.clone(),
            });

            match path.as_str() {
                session_store::RENEWAL_PATH => self.renewal_response().await,
                session_store::LOGIN_PATH => {
                    let body = request.body.unwrap_or_default();
                    if String::from_utf8_lossy(&body).contains("good") {
                        Ok(TransportResponse::new(
                            200,
                            r#"{"accessToken":"T1","user":{"_id":"u1","role":"admin"}}"#,
                        ))
                    } else {
                        Ok(TransportResponse::new(401, r#"{"message":"invalid credentials"}"#))
                    }
                }
                "/boom" => Ok(TransportResponse::new(500, "internal error")),
                "/unreachable" => Err(TransportError::Connect("connection refused".into())),
                _ => {
                    let expected = format!("Bearer {}", self.valid_token);
                    if authorization.as_deref() == Some(expected.as_str()) {
                        Ok(TransportResponse::new(200, r#"{"ok":true}"#))
                    } else {
                        Ok(TransportResponse::new(401, r#"{"message":"jwt expired"}"#))
                    }
                }
            }
        })
    }
}

/// Renewer that counts calls and yields a fixed outcome.
pub struct StubRenewer {
    outcome: Result<&'static str, RenewalError>,
    gated: bool,
    gate: Semaphore,
    calls: AtomicUsize,
    panics: bool,
}

impl StubRenewer {
    pub fn succeeding(token: &'static str) -> Self {
        Self::with_outcome(Ok(token))
    }

    pub fn failing(error: RenewalError) -> Self {
        Self::with_outcome(Err(error))
    }

    pub fn panicking() -> Self {
        let mut stub = Self::with_outcome(Ok("unused"));
        stub.panics = true;
        stub
    }

    fn with_outcome(outcome: Result<&'static str, RenewalError>) -> Self {
        Self {
            outcome,
            gated: false,
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
            panics: false,
        }
    }

    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Renewer for StubRenewer {
    fn renew(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Credential, RenewalError>> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.gated {
                match self.gate.acquire().await {
                    Ok(permit) => permit.forget(),
                    Err(e) => return Err(RenewalError::Aborted(e.to_string())),
                }
            }
            // Let queued callers interleave with the in-flight renewal
            tokio::task::yield_now().await;
            if self.panics {
                panic!("renewer blew up");
            }
            self.outcome.clone().map(Credential::new)
        })
    }
}

/// Memory storage whose credential writes park until released, holding a
/// finished renewal between `store.set` and the drain.
pub struct HeldStorage {
    inner: MemoryStorage,
    gate: Semaphore,
    held: AtomicUsize,
}

impl HeldStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            gate: Semaphore::new(0),
            held: AtomicUsize::new(0),
        }
    }

    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Credential writes that have reached the gate.
    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for HeldStorage {
    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
        self.inner.get(key)
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            if key == ACCESS_TOKEN_KEY {
                self.held.fetch_add(1, Ordering::SeqCst);
                match self.gate.acquire().await {
                    Ok(permit) => permit.forget(),
                    Err(e) => return Err(session_store::Error::Storage(e.to_string())),
                }
            }
            self.inner.set(key, value).await
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()> {
        self.inner.remove(key)
    }
}

/// Yield until `count` credential writes are parked in `storage`.
pub async fn wait_for_held(storage: &HeldStorage, count: usize) {
    for _ in 0..10_000 {
        if storage.held() >= count {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected {count} held credential writes, found {}", storage.held());
}

/// Settings pointing at the scripted base URL.
pub fn settings() -> Settings {
    Settings::new(BASE_URL)
}

/// Dispatcher over `transport`, with `token` pre-stored if given.
pub async fn dispatcher(
    transport: Arc<ScriptedTransport>,
    token: Option<&str>,
) -> (Arc<RequestDispatcher>, Arc<CredentialStore>) {
    dispatcher_with(settings(), transport, token).await
}

pub async fn dispatcher_with(
    settings: Settings,
    transport: Arc<ScriptedTransport>,
    token: Option<&str>,
) -> (Arc<RequestDispatcher>, Arc<CredentialStore>) {
    let store = Arc::new(CredentialStore::in_memory());
    if let Some(token) = token {
        store.set(&Credential::new(token)).await.unwrap();
    }
    let dispatcher = RequestDispatcher::new(settings, transport, store.clone(), Connectivity::default());
    (Arc::new(dispatcher), store)
}

/// Yield until `count` callers are queued on the coordinator.
pub async fn wait_for_pending(coordinator: &RefreshCoordinator, count: usize) {
    for _ in 0..10_000 {
        if coordinator.pending().await >= count {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!(
        "expected {count} queued callers, found {}",
        coordinator.pending().await
    );
}

/// Short bound for "this must already have resolved" checks.
pub const SETTLE: Duration = Duration::from_secs(5);
