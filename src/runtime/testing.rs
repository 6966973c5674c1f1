//! Mock implementations for testing
//!
//! These mocks let the dispatcher run end-to-end without network or disk.

use super::traits::*;
use crate::commerce::{Cart, CartItem, CommerceGateway, GatewayError, ProductRef};
use crate::credentials::{now_epoch, AuthError, Credential, IdentityProvider};
use crate::state_machine::{ConversationId, SessionState};
use crate::store::StoreError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// In-memory session store
// ============================================================================

/// Session store keeping raw state names, so corrupt values can be seeded
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<ConversationId, String>>,
    credential: Mutex<Option<Credential>>,
    writes: Mutex<Vec<(ConversationId, SessionState)>>,
    fail_next_get: Mutex<bool>,
    fail_next_set: Mutex<bool>,
}

#[allow(dead_code)]
impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(self, conversation_id: ConversationId, state: SessionState) -> Self {
        self.insert_raw(conversation_id, state.as_str());
        self
    }

    pub fn insert_raw(&self, conversation_id: ConversationId, value: &str) {
        self.sessions
            .lock()
            .unwrap()
            .insert(conversation_id, value.to_string());
    }

    /// Stored state, panicking on a corrupt value
    pub fn state(&self, conversation_id: ConversationId) -> Option<SessionState> {
        self.sessions
            .lock()
            .unwrap()
            .get(&conversation_id)
            .map(|raw| raw.parse().unwrap())
    }

    pub fn raw(&self, conversation_id: ConversationId) -> Option<String> {
        self.sessions.lock().unwrap().get(&conversation_id).cloned()
    }

    /// Every successful `set`, in order
    pub fn writes(&self) -> Vec<(ConversationId, SessionState)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn fail_next_get(&self) {
        *self.fail_next_get.lock().unwrap() = true;
    }

    pub fn fail_next_set(&self) {
        *self.fail_next_set.lock().unwrap() = true;
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, conversation_id: ConversationId) -> Result<Option<SessionState>, StoreError> {
        if std::mem::take(&mut *self.fail_next_get.lock().unwrap()) {
            return Err(StoreError::Background("injected read failure".to_string()));
        }
        let raw = self.sessions.lock().unwrap().get(&conversation_id).cloned();
        match raw {
            Some(raw) => Ok(Some(raw.parse()?)),
            None => Ok(None),
        }
    }

    async fn set(&self, conversation_id: ConversationId, state: SessionState) -> Result<(), StoreError> {
        if std::mem::take(&mut *self.fail_next_set.lock().unwrap()) {
            return Err(StoreError::Background("injected write failure".to_string()));
        }
        self.insert_raw(conversation_id, state.as_str());
        self.writes.lock().unwrap().push((conversation_id, state));
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InMemorySessionStore {
    async fn get_credential(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.credential.lock().unwrap().clone())
    }

    async fn set_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        *self.credential.lock().unwrap() = Some(credential.clone());
        Ok(())
    }
}

// ============================================================================
// Mock commerce gateway
// ============================================================================

/// A call the gateway received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    ListProducts,
    GetProduct(String),
    DownloadImage(String),
    AddToCart {
        conversation_id: ConversationId,
        sku: String,
        quantity: u32,
    },
    RemoveFromCart {
        conversation_id: ConversationId,
        item_id: String,
    },
    GetCart(ConversationId),
    CreateCustomer(String),
}

/// Catalog and carts held in memory
#[derive(Default)]
pub struct MockGateway {
    products: Vec<ProductRef>,
    images: HashMap<String, Vec<u8>>,
    carts: Mutex<HashMap<ConversationId, Vec<CartItem>>>,
    calls: Mutex<Vec<(String, GatewayCall)>>,
    /// Queued failures per operation name
    failures: Mutex<HashMap<&'static str, VecDeque<GatewayError>>>,
    /// Tokens the gateway answers with `Auth`
    revoked: Mutex<HashSet<String>>,
    customers: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    next_item: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl MockGateway {
    pub fn new(products: Vec<ProductRef>) -> Self {
        Self {
            products,
            ..Self::default()
        }
    }

    pub fn with_image(mut self, product_id: &str, bytes: Vec<u8>) -> Self {
        self.images.insert(product_id.to_string(), bytes);
        self
    }

    /// Hold every call for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_next(&self, operation: &'static str, error: GatewayError) {
        self.failures
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    pub fn revoke(&self, token: &str) {
        self.revoked.lock().unwrap().insert(token.to_string());
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Token presented with each call, in order
    pub fn tokens(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(token, _)| token.clone())
            .collect()
    }

    pub fn cart(&self, conversation_id: ConversationId) -> Vec<CartItem> {
        self.carts
            .lock()
            .unwrap()
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn customers(&self) -> HashSet<String> {
        self.customers.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(
        &self,
        operation: &'static str,
        token: &str,
        call: GatewayCall,
    ) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push((token.to_string(), call));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.revoked.lock().unwrap().contains(token) {
            return Err(GatewayError::auth("401 Unauthorized"));
        }
        if let Some(error) = self
            .failures
            .lock()
            .unwrap()
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        Ok(())
    }

    fn product(&self, product_id: &str) -> Result<ProductRef, GatewayError> {
        self.products
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(format!("product {product_id}")))
    }
}

#[async_trait]
impl CommerceGateway for MockGateway {
    async fn list_products(&self, token: &str) -> Result<Vec<ProductRef>, GatewayError> {
        self.enter("list_products", token, GatewayCall::ListProducts)
            .await?;
        Ok(self.products.clone())
    }

    async fn get_product(&self, token: &str, product_id: &str) -> Result<ProductRef, GatewayError> {
        self.enter(
            "get_product",
            token,
            GatewayCall::GetProduct(product_id.to_string()),
        )
        .await?;
        self.product(product_id)
    }

    async fn download_primary_image(
        &self,
        token: &str,
        product_id: &str,
    ) -> Result<Option<Vec<u8>>, GatewayError> {
        self.enter(
            "download_primary_image",
            token,
            GatewayCall::DownloadImage(product_id.to_string()),
        )
        .await?;
        Ok(self.images.get(product_id).cloned())
    }

    async fn add_to_cart(
        &self,
        token: &str,
        conversation_id: ConversationId,
        sku: &str,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        self.enter(
            "add_to_cart",
            token,
            GatewayCall::AddToCart {
                conversation_id,
                sku: sku.to_string(),
                quantity,
            },
        )
        .await?;

        let product = self
            .products
            .iter()
            .find(|p| p.sku == sku)
            .cloned()
            .ok_or_else(|| GatewayError::rejected(format!("unknown sku {sku}")))?;

        let mut carts = self.carts.lock().unwrap();
        let items = carts.entry(conversation_id).or_default();
        if let Some(item) = items.iter_mut().find(|i| i.sku == sku) {
            item.quantity += quantity;
        } else {
            let n = self.next_item.fetch_add(1, Ordering::SeqCst) + 1;
            items.push(CartItem {
                id: format!("item-{n}"),
                product_id: product.id,
                sku: product.sku,
                name: product.name,
                quantity,
                unit_price: product.price,
                line_total: None,
            });
        }
        Ok(())
    }

    async fn remove_from_cart(
        &self,
        token: &str,
        conversation_id: ConversationId,
        item_id: &str,
    ) -> Result<(), GatewayError> {
        self.enter(
            "remove_from_cart",
            token,
            GatewayCall::RemoveFromCart {
                conversation_id,
                item_id: item_id.to_string(),
            },
        )
        .await?;

        let mut carts = self.carts.lock().unwrap();
        let items = carts.entry(conversation_id).or_default();
        let before = items.len();
        items.retain(|i| i.id != item_id);
        if items.len() == before {
            return Err(GatewayError::not_found(format!("cart item {item_id}")));
        }
        Ok(())
    }

    async fn get_cart(&self, token: &str, conversation_id: ConversationId) -> Result<Cart, GatewayError> {
        self.enter("get_cart", token, GatewayCall::GetCart(conversation_id))
            .await?;
        Ok(Cart {
            items: self.cart(conversation_id),
            total: None,
        })
    }

    async fn create_customer(&self, token: &str, email: &str) -> Result<(), GatewayError> {
        self.enter(
            "create_customer",
            token,
            GatewayCall::CreateCustomer(email.to_string()),
        )
        .await?;
        self.customers.lock().unwrap().insert(email.to_string());
        Ok(())
    }
}

// ============================================================================
// Mock transport
// ============================================================================

#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<(ConversationId, Reply)>>,
    deleted: Mutex<Vec<(ConversationId, i64)>>,
    answered: Mutex<Vec<String>>,
    fail_deletes: Mutex<bool>,
    answer_delay: Option<Duration>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every callback acknowledgement for `delay`
    pub fn with_answer_delay(mut self, delay: Duration) -> Self {
        self.answer_delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<(ConversationId, Reply)> {
        self.sent.lock().unwrap().clone()
    }

    /// Text of every reply, in order
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, reply)| reply.text.clone())
            .collect()
    }

    pub fn last(&self) -> Option<Reply> {
        self.sent.lock().unwrap().last().map(|(_, r)| r.clone())
    }

    pub fn deleted(&self) -> Vec<(ConversationId, i64)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn answered(&self) -> Vec<String> {
        self.answered.lock().unwrap().clone()
    }

    pub fn fail_deletes(&self) {
        *self.fail_deletes.lock().unwrap() = true;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, conversation_id: ConversationId, reply: &Reply) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((conversation_id, reply.clone()));
        Ok(())
    }

    async fn delete_message(
        &self,
        conversation_id: ConversationId,
        message_id: i64,
    ) -> Result<(), TransportError> {
        if *self.fail_deletes.lock().unwrap() {
            return Err(TransportError("message can't be deleted".to_string()));
        }
        self.deleted
            .lock()
            .unwrap()
            .push((conversation_id, message_id));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        if let Some(delay) = self.answer_delay {
            tokio::time::sleep(delay).await;
        }
        self.answered.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }
}

// ============================================================================
// Mock identity provider
// ============================================================================

/// Issues `token-<n>`, where n counts every call including failed ones
#[derive(Default)]
pub struct MockIdentity {
    calls: AtomicUsize,
    delay: Option<Duration>,
    failures: Mutex<VecDeque<AuthError>>,
}

#[allow(dead_code)]
impl MockIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_next(&self, error: AuthError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn issue_token(&self) -> Result<Credential, AuthError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(Credential::new(format!("token-{n}"), now_epoch() + 3600))
    }
}

/// Small fixed catalog shared by dispatcher tests
pub fn sample_products() -> Vec<ProductRef> {
    vec![
        ProductRef {
            id: "p-1".to_string(),
            sku: "TEA-001".to_string(),
            name: "Green Tea".to_string(),
            description: "Loose leaf sencha".to_string(),
            price: Some("$4.50".to_string()),
        },
        ProductRef {
            id: "p-2".to_string(),
            sku: "MUG-002".to_string(),
            name: "Stoneware Mug".to_string(),
            description: String::new(),
            price: Some("$12.00".to_string()),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_gateway_cart_accumulates() {
        let gateway = MockGateway::new(sample_products());
        let id = ConversationId(1);

        gateway.add_to_cart("t", id, "TEA-001", 1).await.unwrap();
        gateway.add_to_cart("t", id, "TEA-001", 3).await.unwrap();
        gateway.add_to_cart("t", id, "MUG-002", 1).await.unwrap();

        let cart = gateway.get_cart("t", id).await.unwrap();
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.items[0].quantity, 4);
    }

    #[tokio::test]
    async fn test_mock_gateway_revoked_token() {
        let gateway = MockGateway::new(sample_products());
        gateway.revoke("old");
        let err = gateway.list_products("old").await.unwrap_err();
        assert_eq!(err.kind, crate::commerce::GatewayErrorKind::Auth);
        assert!(gateway.list_products("new").await.is_ok());
    }
}
