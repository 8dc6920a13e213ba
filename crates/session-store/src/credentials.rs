//! Bearer credential store and session signal bus
//!
//! `CredentialStore` is a thin typed layer over a `KeyValueStore`: it knows
//! which keys hold the access token and the cached user profile, and it owns
//! the broadcast channel on which "session invalidated" is published. Clearing
//! always publishes, whether or not a credential was present, so the embedding
//! application can reset UI state unconditionally.

use std::fmt;
use std::sync::Arc;

use common::Secret;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::constants::{ACCESS_TOKEN_KEY, EVENT_CHANNEL_CAPACITY, USER_KEY};
use crate::error::{Error, Result};
use crate::storage::{KeyValueStore, MemoryStorage};

/// Opaque bearer token. Never interpreted locally; validity is the server's call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Secret<String>);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose()
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0.expose())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.0)
    }
}

/// Why the session was invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// The renewal call failed or timed out
    RenewalFailed,
    /// A request was rejected again after its one retry, or the renewal
    /// endpoint itself answered 401
    AuthRejected,
    /// Explicit logout
    LoggedOut,
}

impl InvalidationReason {
    pub fn label(&self) -> &'static str {
        match self {
            InvalidationReason::RenewalFailed => "renewal_failed",
            InvalidationReason::AuthRejected => "auth_rejected",
            InvalidationReason::LoggedOut => "logged_out",
        }
    }
}

/// Events published to the surrounding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Invalidated { reason: InvalidationReason },
}

pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { storage, events }
    }

    /// Store scoped to this process only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Current credential, if logged in. An empty stored token counts as none.
    pub async fn get(&self) -> Result<Option<Credential>> {
        let token = self.storage.get(ACCESS_TOKEN_KEY).await?;
        Ok(token.filter(|t| !t.is_empty()).map(Credential::new))
    }

    /// Replace the stored credential.
    pub async fn set(&self, credential: &Credential) -> Result<()> {
        self.storage
            .set(ACCESS_TOKEN_KEY, credential.expose().to_string())
            .await?;
        debug!("stored access credential");
        Ok(())
    }

    /// Cache the logged-in user's profile.
    pub async fn set_user(&self, user: &serde_json::Value) -> Result<()> {
        let encoded = serde_json::to_string(user)
            .map_err(|e| Error::Parse(format!("serializing user profile: {e}")))?;
        self.storage.set(USER_KEY, encoded).await
    }

    pub async fn user(&self) -> Result<Option<serde_json::Value>> {
        match self.storage.get(USER_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| Error::Parse(format!("parsing cached user profile: {e}"))),
            None => Ok(None),
        }
    }

    /// Remove the credential and cached profile, then publish `Invalidated`.
    ///
    /// The signal is sent even if a storage removal failed; the first storage
    /// error is still returned to the caller.
    pub async fn clear(&self, reason: InvalidationReason) -> Result<()> {
        let token_result = self.storage.remove(ACCESS_TOKEN_KEY).await;
        let user_result = self.storage.remove(USER_KEY).await;

        metrics::counter!("session_invalidations_total", "reason" => reason.label())
            .increment(1);
        let delivered = self
            .events
            .send(SessionEvent::Invalidated { reason })
            .unwrap_or(0);
        info!(reason = reason.label(), subscribers = delivered, "session invalidated");

        if let Err(e) = &token_result {
            warn!(error = %e, "failed to remove access token from storage");
        }
        token_result.and(user_result)
    }

    /// Subscribe to session events. Only events sent after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
