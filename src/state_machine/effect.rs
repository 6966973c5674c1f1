//! Actions produced by state transitions

use super::state::SessionState;

/// Side effects to be executed, in order, after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    /// Fetch the catalog and render it as a product menu
    ShowCatalog,

    /// Fetch one product and render its card with add/cart/back controls
    ShowProduct { product_id: String },

    /// Resolve the product's SKU, add it to the cart and confirm
    AddToCart { product_id: String, quantity: u32 },

    /// Fetch the cart and render items, total and per-item remove buttons
    ShowCart,

    /// Remove one cart line and confirm
    RemoveFromCart { item_id: String },

    /// Ask for the customer's email
    PromptEmail,

    /// Register the customer with the commerce API
    CreateCustomer { email: String },

    /// Plain text reply
    SendText { text: String },

    /// Repeat the hint for a state without changing anything
    Reprompt { state: SessionState },

    /// Remove the menu a tapped button belonged to (best-effort)
    DismissMessage { message_id: i64 },
}

impl OutboundAction {
    pub fn send_text(text: impl Into<String>) -> Self {
        OutboundAction::SendText { text: text.into() }
    }

    pub fn reprompt(state: SessionState) -> Self {
        OutboundAction::Reprompt { state }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            OutboundAction::ShowCatalog => "show_catalog",
            OutboundAction::ShowProduct { .. } => "show_product",
            OutboundAction::AddToCart { .. } => "add_to_cart",
            OutboundAction::ShowCart => "show_cart",
            OutboundAction::RemoveFromCart { .. } => "remove_from_cart",
            OutboundAction::PromptEmail => "prompt_email",
            OutboundAction::CreateCustomer { .. } => "create_customer",
            OutboundAction::SendText { .. } => "send_text",
            OutboundAction::Reprompt { .. } => "reprompt",
            OutboundAction::DismissMessage { .. } => "dismiss_message",
        }
    }
}
