//! Access credential for the commerce API
//!
//! A single client-credentials token is shared by every conversation. It is
//! refreshed lazily when it expires, with at most one refresh in flight.

use crate::runtime::CredentialStore;
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::Mutex;

/// Short-lived bearer token and its absolute expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    /// Epoch seconds
    pub expires_at: i64,
}

impl Credential {
    pub fn new(value: impl Into<String>, expires_at: i64) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Usable at `now`, keeping `margin` seconds of headroom
    pub fn is_valid_at(&self, now: i64, margin: i64) -> bool {
        now.saturating_add(margin) < self.expires_at
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("identity endpoint rejected client credentials: {0}")]
    Rejected(String),
    #[error("identity endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

/// Issues fresh credentials (the OAuth token endpoint)
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn issue_token(&self) -> Result<Credential, AuthError>;
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    async fn issue_token(&self) -> Result<Credential, AuthError> {
        (**self).issue_token().await
    }
}

pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Holds the process-wide credential and refreshes it on expiry
pub struct CredentialManager<I> {
    identity: I,
    current: RwLock<Option<Credential>>,
    /// Held for the duration of a refresh; concurrent callers queue here
    refresh_gate: Mutex<()>,
    /// Shared copy in the session store, so other instances can reuse it
    mirror: Option<Arc<dyn CredentialStore>>,
    refresh_margin: i64,
}

impl<I: IdentityProvider> CredentialManager<I> {
    pub fn new(identity: I) -> Self {
        Self {
            identity,
            current: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            mirror: None,
            refresh_margin: 0,
        }
    }

    /// Mirror credentials into a shared store
    pub fn with_mirror(mut self, mirror: Arc<dyn CredentialStore>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Treat credentials as expired this many seconds early
    pub fn with_refresh_margin(mut self, seconds: i64) -> Self {
        self.refresh_margin = seconds.max(0);
        self
    }

    /// Start from a credential obtained elsewhere
    #[allow(dead_code)] // Used by tests to seed a known token
    pub fn with_credential(self, credential: Credential) -> Self {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
        self
    }

    /// Current credential, refreshing first if it has expired
    pub async fn ensure_valid(&self) -> Result<Credential, AuthError> {
        if let Some(credential) = self.fresh() {
            return Ok(credential);
        }

        let _gate = self.refresh_gate.lock().await;

        // Someone else may have refreshed while we waited on the gate
        if let Some(credential) = self.fresh() {
            return Ok(credential);
        }

        if let Some(credential) = self.mirrored().await {
            tracing::debug!(expires_at = credential.expires_at, "Adopting mirrored credential");
            self.swap(credential.clone());
            return Ok(credential);
        }

        self.refresh_locked().await
    }

    /// Discard the current credential and obtain a new one.
    ///
    /// If another task already replaced the credential this caller saw, that
    /// replacement is returned instead of issuing a second refresh.
    pub async fn force_refresh(&self) -> Result<Credential, AuthError> {
        let observed = self.snapshot();
        let _gate = self.refresh_gate.lock().await;

        if let Some(current) = self.fresh() {
            if Some(&current) != observed.as_ref() {
                return Ok(current);
            }
        }

        self.refresh_locked().await
    }

    /// Must be called with `refresh_gate` held
    async fn refresh_locked(&self) -> Result<Credential, AuthError> {
        tracing::info!("Refreshing commerce API credential");

        let credential = match self.identity.issue_token().await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Credential refresh failed");
                return Err(e);
            }
        };

        self.swap(credential.clone());

        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.set_credential(&credential).await {
                tracing::warn!(error = %e, "Failed to mirror credential to store");
            }
        }

        tracing::info!(expires_at = credential.expires_at, "Credential refreshed");
        Ok(credential)
    }

    async fn mirrored(&self) -> Option<Credential> {
        let mirror = self.mirror.as_ref()?;
        match mirror.get_credential().await {
            Ok(Some(credential)) if credential.is_valid_at(now_epoch(), self.refresh_margin) => {
                Some(credential)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read mirrored credential");
                None
            }
        }
    }

    fn snapshot(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fresh(&self) -> Option<Credential> {
        self.snapshot()
            .filter(|c| c.is_valid_at(now_epoch(), self.refresh_margin))
    }

    fn swap(&self, credential: Credential) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }
}
