//! Core conversation state machine
//!
//! Pure state transitions: given the stored position and a classified input,
//! produce the next position and the ordered actions the dispatcher must run.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::OutboundAction;
pub use event::{Input, Update};
pub use state::{ConversationId, SessionState};
pub use transition::transition;
