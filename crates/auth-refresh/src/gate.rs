//! Post-response authorization check
//!
//! Decides, for every response, whether the caller gets it as-is, gets a
//! renewed credential to retry with, or gets `AuthExpired`. Only 401 is an
//! auth failure; every other status passes straight through.

use std::sync::Arc;

use session_store::{Credential, CredentialStore, InvalidationReason};
use tracing::{debug, warn};
use transport::TransportResponse;

use crate::coordinator::RefreshCoordinator;
use crate::descriptor::RequestDescriptor;
use crate::error::{Error, Result};

const UNAUTHORIZED: u16 = 401;

/// What the dispatcher should do with a response.
#[derive(Debug)]
pub enum Verdict {
    /// Hand the response to the caller
    Complete(TransportResponse),
    /// Replay the descriptor with this credential
    Retry(Credential),
}

pub struct AuthGate {
    coordinator: RefreshCoordinator,
    store: Arc<CredentialStore>,
    renewal_path: String,
    login_path: String,
}

impl AuthGate {
    pub fn new(
        coordinator: RefreshCoordinator,
        store: Arc<CredentialStore>,
        renewal_path: impl Into<String>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            coordinator,
            store,
            renewal_path: renewal_path.into(),
            login_path: login_path.into(),
        }
    }

    /// Inspect a response for `descriptor`.
    ///
    /// On a first 401 this marks the descriptor retried and suspends on the
    /// coordinator. A second 401, or a 401 from the renewal endpoint itself,
    /// invalidates the session and is never queued.
    pub async fn inspect(
        &self,
        descriptor: &mut RequestDescriptor,
        response: TransportResponse,
    ) -> Result<Verdict> {
        if response.status != UNAUTHORIZED {
            return Ok(Verdict::Complete(response));
        }

        // Wrong username/password, not an expired session
        if descriptor.targets(&self.login_path) {
            debug!(request_id = %descriptor.id, "login rejected, passing through");
            return Ok(Verdict::Complete(response));
        }

        if descriptor.retried || descriptor.targets(&self.renewal_path) {
            warn!(
                request_id = %descriptor.id,
                path = %descriptor.path,
                retried = descriptor.retried,
                "authorization rejected after renewal, ending session"
            );
            if let Err(e) = self.store.clear(InvalidationReason::AuthRejected).await {
                warn!(error = %e, "failed to clear session");
            }
            return Err(Error::AuthExpired);
        }

        descriptor.retried = true;
        let credential = self.coordinator.await_renewal(descriptor.id).await?;
        Ok(Verdict::Retry(credential))
    }
}
