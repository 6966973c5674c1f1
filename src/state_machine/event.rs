//! Inbound updates and the inputs classified from them

use super::state::ConversationId;

/// Reserved text that always resets the conversation
pub const START_COMMAND: &str = "/start";

/// Callback payload keywords
pub const PAYLOAD_CART: &str = "cart";
pub const PAYLOAD_BACK: &str = "go_back";
pub const PAYLOAD_PAY: &str = "pay";

/// Separator between product id and quantity in an add-to-cart payload
pub const FIELD_SEPARATOR: char = '~';

/// One inbound event from the chat transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Free text typed by the user
    Message {
        conversation_id: ConversationId,
        text: String,
    },
    /// A button tap carrying a callback payload
    Callback {
        conversation_id: ConversationId,
        payload: String,
        /// Message the tapped button belongs to
        source_message_id: i64,
        /// Transport handle used to acknowledge the tap
        callback_id: Option<String>,
    },
}

impl Update {
    pub fn conversation_id(&self) -> ConversationId {
        match self {
            Update::Message {
                conversation_id, ..
            }
            | Update::Callback {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    /// Message to dismiss when the screen changes, if the update came from a button
    pub fn source_message_id(&self) -> Option<i64> {
        match self {
            Update::Message { .. } => None,
            Update::Callback {
                source_message_id, ..
            } => Some(*source_message_id),
        }
    }

    pub fn callback_id(&self) -> Option<&str> {
        match self {
            Update::Message { .. } => None,
            Update::Callback { callback_id, .. } => callback_id.as_deref(),
        }
    }

    /// Classify into the logical input the state machine consumes
    pub fn input(&self) -> Input {
        match self {
            Update::Message { text, .. } => Input::from_text(text),
            Update::Callback { payload, .. } => Input::from_payload(payload),
        }
    }
}

/// Logical input token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// The `/start` command
    Start,
    /// Any other free text
    Text(String),
    /// A bare identifier: a product in the catalog, a cart item in the cart
    Choice(String),
    AddToCart { product_id: String, quantity: u32 },
    OpenCart,
    GoBack,
    Pay,
    /// Payload that matches no rule of the callback grammar
    Malformed(String),
}

impl Input {
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed == START_COMMAND {
            Input::Start
        } else {
            Input::Text(trimmed.to_string())
        }
    }

    /// Parse a callback payload. Never fails: anything off-grammar is `Malformed`.
    pub fn from_payload(payload: &str) -> Self {
        match payload {
            PAYLOAD_CART => return Input::OpenCart,
            PAYLOAD_BACK => return Input::GoBack,
            PAYLOAD_PAY => return Input::Pay,
            _ => {}
        }

        if let Some((product_id, quantity)) = payload.split_once(FIELD_SEPARATOR) {
            return match (is_identifier(product_id), quantity.parse::<u32>()) {
                (true, Ok(quantity)) if quantity > 0 => Input::AddToCart {
                    product_id: product_id.to_string(),
                    quantity,
                },
                _ => Input::Malformed(payload.to_string()),
            };
        }

        if is_identifier(payload) {
            Input::Choice(payload.to_string())
        } else {
            Input::Malformed(payload.to_string())
        }
    }

    /// Encode an add-to-cart payload
    pub fn add_to_cart_payload(product_id: &str, quantity: u32) -> String {
        format!("{product_id}{FIELD_SEPARATOR}{quantity}")
    }
}

/// Catalog and cart ids: ASCII letters, digits, `-` and `_` only
fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
