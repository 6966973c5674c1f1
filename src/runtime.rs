//! Runtime for handling chat updates
//!
//! Wires the pure state machine to the session store, the commerce gateway
//! and the chat transport.

mod dispatcher;
mod error;
mod locks;
mod queue;
mod render;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, ErrorClass};
pub use queue::UpdateQueue;
pub use traits::*;

use crate::commerce::{CommerceClient, LoggingGateway};
use crate::store::SqliteSessionStore;
use crate::telegram::TelegramClient;
use std::sync::Arc;

/// Type alias for the production dispatcher with concrete implementations
pub type ProductionDispatcher = Dispatcher<
    SqliteSessionStore,
    LoggingGateway<Arc<CommerceClient>>,
    Arc<TelegramClient>,
    Arc<CommerceClient>,
>;

/// Update queue feeding the production dispatcher
pub type ProductionQueue = UpdateQueue<
    SqliteSessionStore,
    LoggingGateway<Arc<CommerceClient>>,
    Arc<TelegramClient>,
    Arc<CommerceClient>,
>;
