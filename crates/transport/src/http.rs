//! reqwest-backed transport
//!
//! The client keeps a cookie jar so the renewal endpoint can be authorized by
//! the refresh cookie the server set at login, the same way a browser sends
//! credentials along with the renewal call.

use crate::{Result, Transport, TransportError, TransportRequest, TransportResponse};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with its own connection pool and cookie jar.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::Request(format!("building HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: TransportRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + '_>> {
        Box::pin(async move {
            let TransportRequest {
                method,
                url,
                headers,
                body,
                timeout,
            } = request;

            let mut builder = self
                .client
                .request(method, &url)
                .headers(headers)
                .timeout(timeout);
            if let Some(body) = body {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::Body(e.to_string()))?;

            debug!(url, status, bytes = body.len(), "transport call completed");
            Ok(TransportResponse { status, body })
        })
    }
}
