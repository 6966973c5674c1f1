//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the dispatcher with in-memory implementations.

use crate::credentials::Credential;
use crate::state_machine::{ConversationId, SessionState};
use crate::store::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Storage for conversation positions.
///
/// Per-key last-write-wins only; ordering between updates of one
/// conversation comes from the dispatcher's lock, not from the store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current state, `None` for a conversation never seen before
    async fn get(&self, conversation_id: ConversationId) -> Result<Option<SessionState>, StoreError>;

    /// Overwrite the current state
    async fn set(&self, conversation_id: ConversationId, state: SessionState) -> Result<(), StoreError>;
}

/// Process-wide credential slots shared through the session store
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credential(&self) -> Result<Option<Credential>, StoreError>;

    /// Write token and expiry together; never one without the other
    async fn set_credential(&self, credential: &Credential) -> Result<(), StoreError>;
}

/// Inline button under a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

impl Button {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// A message to render in the chat
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    pub text: String,
    /// Rows of inline buttons
    pub keyboard: Vec<Vec<Button>>,
    /// Image to send with `text` as its caption
    pub photo: Option<Vec<u8>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_row(mut self, row: Vec<Button>) -> Self {
        self.keyboard.push(row);
        self
    }

    pub fn with_photo(mut self, photo: Option<Vec<u8>>) -> Self {
        self.photo = photo;
        self
    }
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Outbound side of the chat transport
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, conversation_id: ConversationId, reply: &Reply) -> Result<(), TransportError>;

    async fn delete_message(
        &self,
        conversation_id: ConversationId,
        message_id: i64,
    ) -> Result<(), TransportError>;

    /// Acknowledge a button tap so the client stops its spinner
    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn get(&self, conversation_id: ConversationId) -> Result<Option<SessionState>, StoreError> {
        (**self).get(conversation_id).await
    }

    async fn set(&self, conversation_id: ConversationId, state: SessionState) -> Result<(), StoreError> {
        (**self).set(conversation_id, state).await
    }
}

#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    async fn get_credential(&self) -> Result<Option<Credential>, StoreError> {
        (**self).get_credential().await
    }

    async fn set_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        (**self).set_credential(credential).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, conversation_id: ConversationId, reply: &Reply) -> Result<(), TransportError> {
        (**self).send(conversation_id, reply).await
    }

    async fn delete_message(
        &self,
        conversation_id: ConversationId,
        message_id: i64,
    ) -> Result<(), TransportError> {
        (**self).delete_message(conversation_id, message_id).await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        (**self).answer_callback(callback_id).await
    }
}
