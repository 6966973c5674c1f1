//! Dispatch errors

use crate::commerce::{GatewayError, GatewayErrorKind};
use crate::credentials::AuthError;
use crate::runtime::TransportError;
use crate::store::StoreError;
use thiserror::Error;

/// Why an update could not be completed.
///
/// Every variant leaves the stored session at its pre-update value.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{action} failed: {source}")]
    Gateway {
        action: &'static str,
        #[source]
        source: GatewayError,
    },
    #[error("credential refresh failed: {0}")]
    Auth(#[from] AuthError),
    #[error("session store: {0}")]
    Store(#[from] StoreError),
    #[error("chat transport: {0}")]
    Transport(#[from] TransportError),
}

/// Error taxonomy used for retry and user-notification decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeout, connection reset, 5xx, store or transport hiccup; retrying may work
    TransientNetwork,
    /// Credential refresh failed, or the API kept refusing a fresh token
    AuthExpiredOrInvalid,
    /// The commerce API refused the specific action
    GatewayRejected,
}

impl DispatchError {
    pub fn gateway(action: &'static str, source: GatewayError) -> Self {
        DispatchError::Gateway { action, source }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DispatchError::Gateway { source, .. } => match source.kind {
                GatewayErrorKind::Auth => ErrorClass::AuthExpiredOrInvalid,
                GatewayErrorKind::Rejected | GatewayErrorKind::NotFound => {
                    ErrorClass::GatewayRejected
                }
                GatewayErrorKind::Network
                | GatewayErrorKind::Timeout
                | GatewayErrorKind::ServerError
                | GatewayErrorKind::Decode => ErrorClass::TransientNetwork,
            },
            DispatchError::Auth(_) => ErrorClass::AuthExpiredOrInvalid,
            DispatchError::Store(_) | DispatchError::Transport(_) => ErrorClass::TransientNetwork,
        }
    }
}
