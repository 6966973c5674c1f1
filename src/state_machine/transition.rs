//! Pure state transition function
//!
//! Given the same state and update this always produces the same result and
//! performs no I/O. Inputs that fit no rule degrade to a re-prompt and leave
//! the state where it was.

use super::{Input, OutboundAction, SessionState, Update};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Result of a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next_state: SessionState,
    pub actions: Vec<OutboundAction>,
}

impl Transition {
    pub fn new(state: SessionState) -> Self {
        Self {
            next_state: state,
            actions: vec![],
        }
    }

    pub fn with_action(mut self, action: OutboundAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Dismiss the tapped menu once everything else has succeeded, so a
    /// failed navigation leaves it in place
    fn dismissing(mut self, source_message_id: Option<i64>) -> Self {
        if let Some(message_id) = source_message_id {
            self.actions.push(OutboundAction::DismissMessage { message_id });
        }
        self
    }

    /// Stay put and repeat the current hint
    pub fn noop(state: SessionState) -> Self {
        Self::new(state).with_action(OutboundAction::reprompt(state))
    }
}

/// Pure transition function
pub fn transition(state: SessionState, update: &Update) -> Transition {
    let dismiss = update.source_message_id();

    match (state, update.input()) {
        (SessionState::Start, _) => {
            Transition::new(SessionState::BrowsingCatalog).with_action(OutboundAction::ShowCatalog)
        }

        // ============================================================
        // Catalog
        // ============================================================
        (SessionState::BrowsingCatalog, Input::Choice(product_id)) => {
            Transition::new(SessionState::ViewingProduct)
                .with_action(OutboundAction::ShowProduct { product_id })
                .dismissing(dismiss)
        }

        (SessionState::BrowsingCatalog | SessionState::ViewingProduct, Input::OpenCart) => {
            Transition::new(SessionState::ViewingCart)
                .with_action(OutboundAction::ShowCart)
                .dismissing(dismiss)
        }

        // ============================================================
        // Product card
        // ============================================================
        (
            SessionState::ViewingProduct,
            Input::AddToCart {
                product_id,
                quantity,
            },
        ) => Transition::new(SessionState::ViewingProduct).with_action(OutboundAction::AddToCart {
            product_id,
            quantity,
        }),

        (SessionState::ViewingProduct | SessionState::ViewingCart, Input::GoBack) => {
            Transition::new(SessionState::BrowsingCatalog)
                .with_action(OutboundAction::ShowCatalog)
                .dismissing(dismiss)
        }

        // ============================================================
        // Cart
        // ============================================================
        (SessionState::ViewingCart, Input::Choice(item_id)) => {
            Transition::new(SessionState::ViewingCart)
                .with_action(OutboundAction::RemoveFromCart { item_id })
                .with_action(OutboundAction::ShowCart)
                .dismissing(dismiss)
        }

        (SessionState::ViewingCart, Input::Pay) => {
            Transition::new(SessionState::AwaitingEmail).with_action(OutboundAction::PromptEmail)
        }

        // ============================================================
        // Checkout
        // ============================================================
        (SessionState::AwaitingEmail, Input::Text(text)) if is_email(&text) => {
            Transition::new(SessionState::Start)
                .with_action(OutboundAction::CreateCustomer {
                    email: text.clone(),
                })
                .with_action(OutboundAction::send_text(format!(
                    "Thank you! We will contact you at {text} to complete the order."
                )))
        }

        // ============================================================
        // Anything else: repeat the prompt, keep the state
        // ============================================================
        (state, _) => Transition::noop(state),
    }
}

pub fn is_email(text: &str) -> bool {
    EMAIL.is_match(text)
}
