//! Per-conversation mutual exclusion
//!
//! Updates for one conversation run strictly one after another; updates for
//! different conversations never wait on each other.

use crate::state_machine::ConversationId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<ConversationId, Arc<AsyncMutex<()>>>;

/// Registry of in-process conversation locks
#[derive(Clone, Default)]
pub struct ConversationLocks {
    locks: Arc<Mutex<LockMap>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `conversation_id`
    pub async fn acquire(&self, conversation_id: ConversationId) -> ConversationGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(conversation_id).or_default().clone()
        };

        // Built before waiting so a cancelled acquire still prunes on drop.
        // The pending lock future is dropped before this guard.
        let mut guard = ConversationGuard {
            conversation_id,
            locks: self.locks.clone(),
            guard: None,
        };
        guard.guard = Some(lock.lock_owned().await);
        guard
    }

    /// Number of conversations with a holder or waiter
    #[allow(dead_code)] // Used by tests
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive access to one conversation; released on drop
pub struct ConversationGuard {
    conversation_id: ConversationId,
    locks: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        // Release first so our own reference no longer counts
        drop(self.guard.take());

        // Waiters clone the Arc under the map lock, so a count of one means
        // nobody is queued and the entry can go.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.conversation_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.conversation_id);
        }
    }
}
