//! HTTP client for the Moltin v2 commerce API

use super::error::GatewayError;
use super::types::{
    Cart, CartItem, CartItemData, Envelope, FileData, ProductData, ProductRef, RelationshipData,
    TokenResponse,
};
use super::CommerceGateway;
use crate::credentials::{now_epoch, AuthError, Credential, IdentityProvider};
use crate::state_machine::ConversationId;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Lifetime assumed when the token response carries no expiry
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid commerce API url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct CommerceClient {
    client: Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
    timeout: Duration,
}

impl CommerceClient {
    pub fn new(
        base_url: &str,
        client_id: String,
        client_secret: String,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let invalid = |reason: String| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed,
            client_id,
            client_secret,
            timeout,
        })
    }

    /// Base URL extended by `segments`, each percent-encoded as a single
    /// path segment
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request, returning status and body whatever the status
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String), GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(&e, self.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::from_reqwest(&e, self.timeout))?;

        Ok((status, body))
    }

    /// Send a request and return the body of a 2xx response
    async fn execute(&self, request: RequestBuilder) -> Result<String, GatewayError> {
        let (status, body) = self.send(request).await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(GatewayError::from_status(status, &body))
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body)
            .map_err(|e| GatewayError::decode(format!("unexpected response shape: {e}")))
    }

    async fn main_image_url(&self, token: &str, product_id: &str) -> Result<Option<String>, GatewayError> {
        let relationship = self
            .fetch::<Envelope<Option<RelationshipData>>>(
                self.client
                    .get(self.url(&["v2", "products", product_id, "relationships", "main-image"]))
                    .bearer_auth(token),
            )
            .await;

        let file_id = match relationship {
            Ok(envelope) => match envelope.data {
                Some(data) => data.id,
                None => return Ok(None),
            },
            Err(e) if e.kind == super::GatewayErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let file: Envelope<FileData> = self
            .fetch(
                self.client
                    .get(self.url(&["v2", "files", &file_id]))
                    .bearer_auth(token),
            )
            .await?;

        Ok(Some(file.data.link.href))
    }
}

#[async_trait]
impl CommerceGateway for CommerceClient {
    async fn list_products(&self, token: &str) -> Result<Vec<ProductRef>, GatewayError> {
        let envelope: Envelope<Vec<ProductData>> = self
            .fetch(self.client.get(self.url(&["v2", "products"])).bearer_auth(token))
            .await?;
        Ok(envelope.data.into_iter().map(ProductRef::from).collect())
    }

    async fn get_product(&self, token: &str, product_id: &str) -> Result<ProductRef, GatewayError> {
        let envelope: Envelope<ProductData> = self
            .fetch(
                self.client
                    .get(self.url(&["v2", "products", product_id]))
                    .bearer_auth(token),
            )
            .await?;
        Ok(envelope.data.into())
    }

    async fn download_primary_image(
        &self,
        token: &str,
        product_id: &str,
    ) -> Result<Option<Vec<u8>>, GatewayError> {
        let Some(href) = self.main_image_url(token, product_id).await? else {
            return Ok(None);
        };

        // File links point at the CDN and take no credential
        let response = self
            .client
            .get(&href)
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(&e, self.timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::from_status(status, ""));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::from_reqwest(&e, self.timeout))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn add_to_cart(
        &self,
        token: &str,
        conversation_id: ConversationId,
        sku: &str,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        let body = json!({
            "data": {
                "type": "cart_item",
                "sku": sku,
                "quantity": quantity,
            }
        });
        self.execute(
            self.client
                .post(self.url(&["v2", "carts", &conversation_id.cart_ref(), "items"]))
                .bearer_auth(token)
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn remove_from_cart(
        &self,
        token: &str,
        conversation_id: ConversationId,
        item_id: &str,
    ) -> Result<(), GatewayError> {
        self.execute(
            self.client
                .delete(self.url(&[
                    "v2",
                    "carts",
                    &conversation_id.cart_ref(),
                    "items",
                    item_id,
                ]))
                .bearer_auth(token),
        )
        .await?;
        Ok(())
    }

    async fn get_cart(&self, token: &str, conversation_id: ConversationId) -> Result<Cart, GatewayError> {
        let envelope: Envelope<Vec<CartItemData>> = self
            .fetch(
                self.client
                    .get(self.url(&["v2", "carts", &conversation_id.cart_ref(), "items"]))
                    .bearer_auth(token),
            )
            .await?;

        let total = envelope
            .meta
            .and_then(|m| m.display_price)
            .and_then(|p| p.with_tax)
            .and_then(|p| p.formatted);

        Ok(Cart {
            items: envelope.data.into_iter().map(CartItem::from).collect(),
            total,
        })
    }

    async fn create_customer(&self, token: &str, email: &str) -> Result<(), GatewayError> {
        let name = email.split('@').next().unwrap_or(email);
        let payload = json!({
            "data": {
                "type": "customer",
                "name": name,
                "email": email,
            }
        });
        let (status, body) = self
            .send(
                self.client
                    .post(self.url(&["v2", "customers"]))
                    .bearer_auth(token)
                    .json(&payload),
            )
            .await?;

        match status {
            s if s.is_success() => Ok(()),
            // Email already registered
            StatusCode::CONFLICT => {
                tracing::debug!("Customer already registered");
                Ok(())
            }
            s => Err(GatewayError::from_status(s, &body)),
        }
    }
}

#[async_trait]
impl IdentityProvider for CommerceClient {
    async fn issue_token(&self) -> Result<Credential, AuthError> {
        let response = self
            .client
            .post(self.url(&["oauth", "access_token"]))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AuthError::Unavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(AuthError::Rejected(format!("HTTP {status}: {body}")));
        }

        parse_token(&body, now_epoch())
    }
}

fn parse_token(body: &str, now: i64) -> Result<Credential, AuthError> {
    let token: TokenResponse =
        serde_json::from_str(body).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

    if token.access_token.is_empty() {
        return Err(AuthError::InvalidResponse("empty access_token".to_string()));
    }

    let expires_at = token
        .expires
        .or_else(|| token.expires_in.map(|secs| now + secs))
        .unwrap_or(now + DEFAULT_TOKEN_LIFETIME_SECS);

    Ok(Credential::new(token.access_token, expires_at))
}
