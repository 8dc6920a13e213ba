//! Request execution entry point
//!
//! `RequestDispatcher` is the drop-in executor used for every API call. It
//! owns the transport, the credential store, the auth gate and the refresh
//! coordinator, and loops at most twice per request: the original attempt and,
//! after a successful renewal, one replay with the renewed credential.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use session_store::{
    Credential, CredentialStore, DEFAULT_RENEWAL_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    InvalidationReason, LOGIN_PATH, RENEWAL_PATH, SessionEvent,
};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use transport::{Transport, TransportError, TransportRequest, TransportResponse};

use crate::connectivity::Connectivity;
use crate::coordinator::RefreshCoordinator;
use crate::descriptor::{RequestDescriptor, Response};
use crate::error::{Error, Result};
use crate::gate::{AuthGate, Verdict};
use crate::renewer::{EndpointRenewer, Renewer};

/// Where and how to reach the API.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub renewal_path: String,
    pub login_path: String,
    pub renewal_timeout: Duration,
}

impl Settings {
    /// Defaults: 10s timeouts, `/auth/refresh` and `/auth/login`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            renewal_path: RENEWAL_PATH.to_string(),
            login_path: LOGIN_PATH.to_string(),
            renewal_timeout: DEFAULT_RENEWAL_TIMEOUT,
        }
    }

    /// Absolute URL for a base-relative path.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

pub struct RequestDispatcher {
    settings: Settings,
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    coordinator: RefreshCoordinator,
    gate: AuthGate,
    connectivity: Connectivity,
}

impl RequestDispatcher {
    /// Dispatcher that renews through the configured renewal endpoint.
    pub fn new(
        settings: Settings,
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        connectivity: Connectivity,
    ) -> Self {
        let renewer = Arc::new(EndpointRenewer::new(
            transport.clone(),
            settings.url_for(&settings.renewal_path),
            settings.renewal_timeout,
        ));
        Self::with_renewer(settings, transport, store, connectivity, renewer)
    }

    pub fn with_renewer(
        settings: Settings,
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        connectivity: Connectivity,
        renewer: Arc<dyn Renewer>,
    ) -> Self {
        let coordinator = RefreshCoordinator::new(renewer, store.clone(), settings.renewal_timeout);
        let gate = AuthGate::new(
            coordinator.clone(),
            store.clone(),
            settings.renewal_path.clone(),
            settings.login_path.clone(),
        );
        Self {
            settings,
            transport,
            store,
            coordinator,
            gate,
            connectivity,
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Session-invalidated signals (logout, renewal failure, rejected retry).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.store.subscribe()
    }

    /// Execute a request with transparent one-shot renewal and replay.
    #[instrument(skip_all, fields(request_id = %descriptor.id, method = %descriptor.method, path = %descriptor.path))]
    pub async fn execute(&self, mut descriptor: RequestDescriptor) -> Result<Response> {
        let mut renewed: Option<Credential> = None;

        loop {
            if !self.connectivity.is_online() {
                warn!("no connectivity, not dispatching");
                return Err(Error::NetworkUnavailable);
            }

            // A replay uses exactly the credential the renewal produced.
            let credential = match renewed.take() {
                Some(credential) => Some(credential),
                None => self.store.get().await?,
            };

            let request = self.build(&descriptor, credential.as_ref())?;
            let started = Instant::now();
            let response = match self.transport.send(request).await {
                Ok(response) => response,
                Err(e) => {
                    crate::metrics::record_transport_error(transport_error_kind(&e));
                    warn!(error = %e, "transport failure");
                    return Err(e.into());
                }
            };
            crate::metrics::record_request(
                descriptor.method.as_str(),
                response.status,
                started.elapsed().as_secs_f64(),
            );

            match self.gate.inspect(&mut descriptor, response).await? {
                Verdict::Complete(response) => return finish(response),
                Verdict::Retry(credential) => {
                    info!("replaying request with renewed credential");
                    renewed = Some(credential);
                }
            }
        }
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        self.execute(RequestDescriptor::get(path)).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        self.execute(RequestDescriptor::new(Method::POST, path).with_json(body)?)
            .await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        self.execute(RequestDescriptor::new(Method::PUT, path).with_json(body)?)
            .await
    }

    pub async fn patch<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        self.execute(RequestDescriptor::new(Method::PATCH, path).with_json(body)?)
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Response> {
        self.execute(RequestDescriptor::new(Method::DELETE, path))
            .await
    }

    /// Log in and persist the session. Returns the user profile, if sent.
    pub async fn login<T: Serialize + ?Sized>(
        &self,
        credentials: &T,
    ) -> Result<Option<serde_json::Value>> {
        let login_path = self.settings.login_path.clone();
        let response = self.post(&login_path, credentials).await?;
        let (credential, user) = session_store::parse_login(&response.body)
            .map_err(|e| Error::Decode(e.to_string()))?;

        self.store.set(&credential).await?;
        if let Some(user) = &user {
            self.store.set_user(user).await?;
        }
        info!("logged in");
        Ok(user)
    }

    /// Clear the session and notify subscribers.
    pub async fn logout(&self) -> Result<()> {
        self.store.clear(InvalidationReason::LoggedOut).await?;
        Ok(())
    }

    fn build(
        &self,
        descriptor: &RequestDescriptor,
        credential: Option<&Credential>,
    ) -> Result<TransportRequest> {
        let mut request = TransportRequest::new(
            descriptor.method.clone(),
            self.settings.url_for(&descriptor.path),
            self.settings.request_timeout,
        );
        request.headers = descriptor.headers.clone();
        if !request.headers.contains_key(CONTENT_TYPE) {
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(credential) = credential {
            let value = HeaderValue::from_str(&credential.bearer())
                .map_err(|e| Error::InvalidRequest(format!("credential is not a valid header: {e}")))?;
            request.headers.insert(AUTHORIZATION, value);
        }
        request.body = descriptor.body.clone();
        Ok(request)
    }
}

fn finish(response: TransportResponse) -> Result<Response> {
    if response.is_success() {
        Ok(Response {
            status: response.status,
            body: response.body,
        })
    } else {
        Err(Error::Http {
            status: response.status,
            body: response.text(),
        })
    }
}

fn transport_error_kind(e: &TransportError) -> &'static str {
    match e {
        TransportError::Timeout(_) => "timeout",
        TransportError::Connect(_) => "connect",
        TransportError::Request(_) => "request",
        TransportError::Body(_) => "body",
    }
}
