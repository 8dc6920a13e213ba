//! The renewal call itself
//!
//! The coordinator only needs "give me a new credential or tell me why not".
//! `EndpointRenewer` answers that with one GET to the renewal endpoint. The
//! call goes straight to the transport, never through the dispatcher, so its
//! own 401 can never re-enter the refresh path.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderValue};
use session_store::Credential;
use tracing::debug;
use transport::{Transport, TransportRequest};

/// Why a renewal produced no credential. Every variant ends the session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenewalError {
    #[error("renewal endpoint returned {status}")]
    Rejected { status: u16 },

    #[error("renewal response unusable: {0}")]
    InvalidResponse(String),

    #[error("renewal transport failure: {0}")]
    Transport(String),

    #[error("renewal timed out after {0:?}")]
    TimedOut(Duration),

    #[error("could not store renewed credential: {0}")]
    Storage(String),

    #[error("renewal task aborted: {0}")]
    Aborted(String),
}

/// Source of renewed credentials.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Renewer>`).
pub trait Renewer: Send + Sync {
    fn renew(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Credential, RenewalError>> + Send + '_>>;
}

/// Renews by calling the renewal endpoint with the transport's cookie jar.
pub struct EndpointRenewer {
    transport: Arc<dyn Transport>,
    url: String,
    timeout: Duration,
}

impl EndpointRenewer {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            url: url.into(),
            timeout,
        }
    }
}

impl Renewer for EndpointRenewer {
    fn renew(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Credential, RenewalError>> + Send + '_>> {
        Box::pin(async move {
            let mut request = TransportRequest::new(Method::GET, self.url.clone(), self.timeout);
            request
                .headers
                .insert(ACCEPT, HeaderValue::from_static("application/json"));

            let response = self
                .transport
                .send(request)
                .await
                .map_err(|e| RenewalError::Transport(e.to_string()))?;

            if !response.is_success() {
                debug!(status = response.status, body = %response.text(), "renewal rejected");
                return Err(RenewalError::Rejected {
                    status: response.status,
                });
            }

            session_store::parse_renewal(&response.body)
                .map_err(|e| RenewalError::InvalidResponse(e.to_string()))
        })
    }
}
