//! Catalog and cart types, plus the wire shapes they are decoded from

use serde::{Deserialize, Serialize};

/// Read-only projection of a catalog product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: String,
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Formatted price including tax, when the catalog provides one
    #[serde(default)]
    pub price: Option<String>,
}

/// One line of a remote cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Cart line id, used to remove the line
    pub id: String,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Option<String>,
    pub line_total: Option<String>,
}

/// Cart contents as last read from the commerce API
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    /// Formatted grand total
    pub total: Option<String>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Wire format (JSON:API style envelopes)
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub meta: Option<CollectionMeta>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CollectionMeta {
    #[serde(default)]
    pub display_price: Option<DisplayPrice>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DisplayPrice {
    #[serde(default)]
    pub with_tax: Option<PriceBlock>,
}

/// Price block; products carry `formatted` directly, cart lines nest `unit`/`value`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PriceBlock {
    #[serde(default)]
    pub formatted: Option<String>,
    #[serde(default)]
    pub unit: Option<Formatted>,
    #[serde(default)]
    pub value: Option<Formatted>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Formatted {
    #[serde(default)]
    pub formatted: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemMeta {
    #[serde(default)]
    pub display_price: Option<DisplayPrice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductData {
    pub id: String,
    #[serde(default)]
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub meta: Option<ItemMeta>,
}

impl From<ProductData> for ProductRef {
    fn from(data: ProductData) -> Self {
        let price = data
            .meta
            .and_then(|m| m.display_price)
            .and_then(|p| p.with_tax)
            .and_then(|p| p.formatted);
        Self {
            id: data.id,
            sku: data.sku,
            name: data.name,
            description: data.description,
            price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CartItemData {
    pub id: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub meta: Option<ItemMeta>,
}

impl From<CartItemData> for CartItem {
    fn from(data: CartItemData) -> Self {
        let prices = data
            .meta
            .and_then(|m| m.display_price)
            .and_then(|p| p.with_tax)
            .unwrap_or_default();
        Self {
            id: data.id,
            product_id: data.product_id,
            sku: data.sku,
            name: data.name,
            quantity: data.quantity,
            unit_price: prices.unit.and_then(|f| f.formatted),
            line_total: prices.value.and_then(|f| f.formatted),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RelationshipData {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileData {
    pub link: FileLink,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileLink {
    pub href: String,
}

/// Client-credentials token response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    /// Absolute expiry, epoch seconds
    #[serde(default)]
    pub expires: Option<i64>,
    /// Relative lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
}
