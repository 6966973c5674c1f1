//! Turns catalog and cart data into chat replies

use super::error::{DispatchError, ErrorClass};
use super::traits::{Button, Reply};
use crate::commerce::{Cart, ProductRef};
use crate::state_machine::event::{PAYLOAD_BACK, PAYLOAD_CART, PAYLOAD_PAY};
use crate::state_machine::{Input, SessionState};
use std::fmt::Write;

/// Quantities offered on a product card
pub const QUANTITY_CHOICES: [u32; 3] = [1, 3, 5];

/// Captions beyond this are cut; the transport caps photo captions at 1024
const MAX_DESCRIPTION_CHARS: usize = 700;

pub fn catalog(products: &[ProductRef]) -> Reply {
    let text = if products.is_empty() {
        "The catalog is empty right now."
    } else {
        "Please choose:"
    };

    products
        .iter()
        .fold(Reply::text(text), |reply, product| {
            reply.with_row(vec![Button::new(&product.name, &product.id)])
        })
        .with_row(vec![Button::new("🛒 Cart", PAYLOAD_CART)])
}

pub fn product_card(product: &ProductRef, photo: Option<Vec<u8>>) -> Reply {
    let mut text = product.name.clone();
    if let Some(price) = &product.price {
        let _ = write!(text, "\n{price}");
    }
    if !product.description.is_empty() {
        let description: String = product
            .description
            .chars()
            .take(MAX_DESCRIPTION_CHARS)
            .collect();
        let _ = write!(text, "\n\n{description}");
    }

    let quantities = QUANTITY_CHOICES
        .iter()
        .map(|&q| {
            Button::new(
                format!("{q} pcs"),
                Input::add_to_cart_payload(&product.id, q),
            )
        })
        .collect();

    Reply::text(text)
        .with_photo(photo)
        .with_row(quantities)
        .with_row(vec![Button::new("🛒 Cart", PAYLOAD_CART)])
        .with_row(vec![Button::new("Back", PAYLOAD_BACK)])
}

pub fn added_to_cart(product: &ProductRef, quantity: u32) -> Reply {
    Reply::text(format!("Added {quantity} × {} to your cart.", product.name))
}

pub fn removed_from_cart() -> Reply {
    Reply::text("Removed from your cart.")
}

pub fn cart(cart: &Cart) -> Reply {
    if cart.is_empty() {
        return Reply::text("Your cart is empty.")
            .with_row(vec![Button::new("Back to menu", PAYLOAD_BACK)]);
    }

    let mut text = String::from("Your cart:\n");
    for item in &cart.items {
        let _ = write!(text, "\n{}\n{} pcs", item.name, item.quantity);
        if let Some(unit) = &item.unit_price {
            let _ = write!(text, " × {unit}");
        }
        if let Some(line) = &item.line_total {
            let _ = write!(text, " = {line}");
        }
        text.push('\n');
    }
    if let Some(total) = &cart.total {
        let _ = write!(text, "\nTotal: {total}");
    }

    cart.items
        .iter()
        .fold(Reply::text(text), |reply, item| {
            reply.with_row(vec![Button::new(format!("Remove {}", item.name), &item.id)])
        })
        .with_row(vec![Button::new("Pay", PAYLOAD_PAY)])
        .with_row(vec![Button::new("Back to menu", PAYLOAD_BACK)])
}

pub fn prompt(state: SessionState) -> Reply {
    Reply::text(state.prompt())
}

/// Failure notice followed by the unchanged prompt, so the user can resume
pub fn failure(error: &DispatchError, state: SessionState) -> Reply {
    let notice = match (error.class(), error) {
        (ErrorClass::GatewayRejected, DispatchError::Gateway { action, source }) => {
            format!("Sorry, {} failed: {}", describe(action), source.message)
        }
        _ => "Something went wrong on our side. Please try again.".to_string(),
    };
    Reply::text(format!("{notice}\n\n{}", state.prompt()))
}

fn describe(action: &str) -> &'static str {
    match action {
        "show_catalog" => "loading the catalog",
        "show_product" => "loading the product",
        "add_to_cart" => "adding to your cart",
        "show_cart" => "loading your cart",
        "remove_from_cart" => "removing the item",
        "create_customer" => "registering your email",
        _ => "your request",
    }
}
