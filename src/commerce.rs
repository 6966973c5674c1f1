//! Commerce API abstraction
//!
//! Catalog, cart and customer calls against the remote store. The core only
//! sees the [`CommerceGateway`] trait; [`CommerceClient`] is the HTTP
//! implementation.

mod client;
mod error;
mod types;

pub use client::CommerceClient;
pub use error::{GatewayError, GatewayErrorKind};
pub use types::{Cart, CartItem, ProductRef};

use crate::state_machine::ConversationId;
use async_trait::async_trait;
use std::sync::Arc;

/// Typed wrapper over the catalog/cart/customer API.
///
/// Every call takes the current access token; obtaining a valid one is the
/// caller's job.
#[async_trait]
pub trait CommerceGateway: Send + Sync {
    async fn list_products(&self, token: &str) -> Result<Vec<ProductRef>, GatewayError>;

    async fn get_product(&self, token: &str, product_id: &str) -> Result<ProductRef, GatewayError>;

    /// Bytes of the product's main image, `None` when it has none
    async fn download_primary_image(
        &self,
        token: &str,
        product_id: &str,
    ) -> Result<Option<Vec<u8>>, GatewayError>;

    async fn add_to_cart(
        &self,
        token: &str,
        conversation_id: ConversationId,
        sku: &str,
        quantity: u32,
    ) -> Result<(), GatewayError>;

    async fn remove_from_cart(
        &self,
        token: &str,
        conversation_id: ConversationId,
        item_id: &str,
    ) -> Result<(), GatewayError>;

    async fn get_cart(&self, token: &str, conversation_id: ConversationId) -> Result<Cart, GatewayError>;

    async fn create_customer(&self, token: &str, email: &str) -> Result<(), GatewayError>;
}

#[async_trait]
impl<T: CommerceGateway + ?Sized> CommerceGateway for Arc<T> {
    async fn list_products(&self, token: &str) -> Result<Vec<ProductRef>, GatewayError> {
        (**self).list_products(token).await
    }

    async fn get_product(&self, token: &str, product_id: &str) -> Result<ProductRef, GatewayError> {
        (**self).get_product(token, product_id).await
    }

    async fn download_primary_image(
        &self,
        token: &str,
        product_id: &str,
    ) -> Result<Option<Vec<u8>>, GatewayError> {
        (**self).download_primary_image(token, product_id).await
    }

    async fn add_to_cart(
        &self,
        token: &str,
        conversation_id: ConversationId,
        sku: &str,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        (**self).add_to_cart(token, conversation_id, sku, quantity).await
    }

    async fn remove_from_cart(
        &self,
        token: &str,
        conversation_id: ConversationId,
        item_id: &str,
    ) -> Result<(), GatewayError> {
        (**self).remove_from_cart(token, conversation_id, item_id).await
    }

    async fn get_cart(&self, token: &str, conversation_id: ConversationId) -> Result<Cart, GatewayError> {
        (**self).get_cart(token, conversation_id).await
    }

    async fn create_customer(&self, token: &str, email: &str) -> Result<(), GatewayError> {
        (**self).create_customer(token, email).await
    }
}

/// Logging wrapper for commerce gateways
pub struct LoggingGateway<G> {
    inner: G,
}

impl<G: CommerceGateway> LoggingGateway<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }

    fn log<T>(operation: &'static str, start: std::time::Instant, result: &Result<T, GatewayError>) {
        let duration = start.elapsed();
        match result {
            Ok(_) => {
                tracing::debug!(
                    operation,
                    duration_ms = %duration.as_millis(),
                    "Commerce request completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    operation,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    transient = e.kind.is_transient(),
                    "Commerce request failed"
                );
            }
        }
    }
}

#[async_trait]
impl<G: CommerceGateway> CommerceGateway for LoggingGateway<G> {
    async fn list_products(&self, token: &str) -> Result<Vec<ProductRef>, GatewayError> {
        let start = std::time::Instant::now();
        let result = self.inner.list_products(token).await;
        Self::log("list_products", start, &result);
        result
    }

    async fn get_product(&self, token: &str, product_id: &str) -> Result<ProductRef, GatewayError> {
        let start = std::time::Instant::now();
        let result = self.inner.get_product(token, product_id).await;
        Self::log("get_product", start, &result);
        result
    }

    async fn download_primary_image(
        &self,
        token: &str,
        product_id: &str,
    ) -> Result<Option<Vec<u8>>, GatewayError> {
        let start = std::time::Instant::now();
        let result = self.inner.download_primary_image(token, product_id).await;
        Self::log("download_primary_image", start, &result);
        result
    }

    async fn add_to_cart(
        &self,
        token: &str,
        conversation_id: ConversationId,
        sku: &str,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        let start = std::time::Instant::now();
        let result = self
            .inner
            .add_to_cart(token, conversation_id, sku, quantity)
            .await;
        Self::log("add_to_cart", start, &result);
        result
    }

    async fn remove_from_cart(
        &self,
        token: &str,
        conversation_id: ConversationId,
        item_id: &str,
    ) -> Result<(), GatewayError> {
        let start = std::time::Instant::now();
        let result = self
            .inner
            .remove_from_cart(token, conversation_id, item_id)
            .await;
        Self::log("remove_from_cart", start, &result);
        result
    }

    async fn get_cart(&self, token: &str, conversation_id: ConversationId) -> Result<Cart, GatewayError> {
        let start = std::time::Instant::now();
        let result = self.inner.get_cart(token, conversation_id).await;
        Self::log("get_cart", start, &result);
        result
    }

    async fn create_customer(&self, token: &str, email: &str) -> Result<(), GatewayError> {
        let start = std::time::Instant::now();
        let result = self.inner.create_customer(token, email).await;
        Self::log("create_customer", start, &result);
        result
    }
}
