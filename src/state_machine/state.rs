//! Conversation state types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable identifier of a chat, one per end user.
///
/// Doubles as the remote cart reference, so every conversation owns exactly
/// one cart on the commerce side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl ConversationId {
    /// Key of this conversation's cart in the commerce API
    pub fn cart_ref(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Nothing shown yet; any input opens the catalog
    #[default]
    Start,
    /// Product list is on screen
    BrowsingCatalog,
    /// A single product card is on screen
    ViewingProduct,
    /// Cart contents are on screen
    ViewingCart,
    /// Checkout started, waiting for the customer's email
    AwaitingEmail,
}

impl SessionState {
    pub const ALL: [SessionState; 5] = [
        SessionState::Start,
        SessionState::BrowsingCatalog,
        SessionState::ViewingProduct,
        SessionState::ViewingCart,
        SessionState::AwaitingEmail,
    ];

    /// Name used as the stored value
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Start => "START",
            SessionState::BrowsingCatalog => "BROWSING_CATALOG",
            SessionState::ViewingProduct => "VIEWING_PRODUCT",
            SessionState::ViewingCart => "VIEWING_CART",
            SessionState::AwaitingEmail => "AWAITING_EMAIL",
        }
    }

    /// Hint repeated to the user when input does not fit this state
    pub fn prompt(self) -> &'static str {
        match self {
            SessionState::Start => "Send /start to open the catalog.",
            SessionState::BrowsingCatalog => "Please choose a product from the list above.",
            SessionState::ViewingProduct => {
                "Use the buttons under the product to add it to your cart, open the cart or go back."
            }
            SessionState::ViewingCart => {
                "Tap an item to remove it, press Pay to check out, or go back to the menu."
            }
            SessionState::AwaitingEmail => {
                "Please send your email address so we can contact you about the order."
            }
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown session state: {0:?}")]
pub struct UnknownState(pub String);

impl FromStr for SessionState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}
