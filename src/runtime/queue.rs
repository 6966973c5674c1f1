//! Per-conversation update queues
//!
//! Updates are handed over in arrival order. Each conversation with pending
//! updates has one worker task draining its queue, so a conversation's
//! updates are handled strictly in the order they were received while other
//! conversations proceed in parallel.

use super::dispatcher::Dispatcher;
use super::error::{DispatchError, ErrorClass};
use super::traits::{SessionStore, Transport};
use crate::commerce::CommerceGateway;
use crate::credentials::IdentityProvider;
use crate::state_machine::{ConversationId, Update};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::task::TaskTracker;

type Workers = Arc<Mutex<HashMap<ConversationId, UnboundedSender<Update>>>>;

pub struct UpdateQueue<S, G, T, I>
where
    S: SessionStore,
    G: CommerceGateway,
    T: Transport,
    I: IdentityProvider,
{
    dispatcher: Arc<Dispatcher<S, G, T, I>>,
    workers: Workers,
    tracker: TaskTracker,
}

impl<S, G, T, I> UpdateQueue<S, G, T, I>
where
    S: SessionStore + 'static,
    G: CommerceGateway + 'static,
    T: Transport + 'static,
    I: IdentityProvider + 'static,
{
    pub fn new(dispatcher: Arc<Dispatcher<S, G, T, I>>) -> Self {
        Self {
            dispatcher,
            workers: Arc::default(),
            tracker: TaskTracker::new(),
        }
    }

    /// Queue an update behind earlier ones for the same conversation
    pub fn push(&self, update: Update) {
        let conversation_id = update.conversation_id();
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);

        // Workers only deregister under this lock, so a live entry always
        // has a receiver still draining it
        let update = match workers.get(&conversation_id) {
            Some(tx) => match tx.send(update) {
                Ok(()) => return,
                Err(mpsc::error::SendError(update)) => update,
            },
            None => update,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(update).is_err() {
            return;
        }
        workers.insert(conversation_id, tx);
        self.tracker.spawn(drain(
            conversation_id,
            self.dispatcher.clone(),
            self.workers.clone(),
            rx,
        ));
    }

    /// Conversations with a live worker
    #[allow(dead_code)] // Used by tests
    pub fn active(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stop accepting work and wait for every queued update to finish
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn drain<S, G, T, I>(
    conversation_id: ConversationId,
    dispatcher: Arc<Dispatcher<S, G, T, I>>,
    workers: Workers,
    mut rx: UnboundedReceiver<Update>,
) where
    S: SessionStore,
    G: CommerceGateway,
    T: Transport,
    I: IdentityProvider,
{
    loop {
        let update = match rx.try_recv() {
            Ok(update) => update,
            Err(_) => {
                let mut workers = workers.lock().unwrap_or_else(PoisonError::into_inner);
                // Re-check under the lock; a push may have landed meanwhile
                match rx.try_recv() {
                    Ok(update) => update,
                    Err(_) => {
                        workers.remove(&conversation_id);
                        return;
                    }
                }
            }
        };

        if let Err(e) = dispatcher.handle(update).await {
            log_failure(conversation_id, &e);
        }
    }
}

fn log_failure(conversation_id: ConversationId, error: &DispatchError) {
    match error.class() {
        ErrorClass::GatewayRejected => {
            tracing::warn!(conv_id = %conversation_id, error = %error, "Update rejected by commerce API");
        }
        class => {
            tracing::error!(conv_id = %conversation_id, class = ?class, error = %error, "Update failed");
        }
    }
}
