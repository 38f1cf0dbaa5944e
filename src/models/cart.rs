use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use crate::models::Money;
use crate::pricing::{self, PricingError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("product {0} is not in the cart")]
    ItemNotFound(String),
    #[error("quantity must be between 1 and {}", u32::MAX)]
    InvalidQuantity,
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub product_name: String,
    pub price: Money,
    pub quantity: u32,
    pub category: String,
    pub product_image: Option<String>,
}

impl CartItem {
    pub fn line_total(&self) -> Money {
        self.price.times(self.quantity)
    }

    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(CartItem {
            product_id: row.try_get("product_id")?,
            product_name: row.try_get("product_name")?,
            price: Money::from_paise(row.try_get("price")?),
            quantity: row.try_get("quantity")?,
            category: row.try_get("category")?,
            product_image: row.try_get("product_image")?,
        })
    }
}

/// A customer's cart with its derived totals.
///
/// Totals are never set directly; every mutation goes through `recompute`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub customer_uid: String,
    pub items: Vec<CartItem>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub item_count: u32,
}

impl Cart {
    pub fn new(customer_uid: impl Into<String>, items: Vec<CartItem>) -> Result<Self, CartError> {
        let mut cart = Cart {
            customer_uid: customer_uid.into(),
            items,
            subtotal: Money::ZERO,
            delivery_fee: Money::ZERO,
            total_amount: Money::ZERO,
            item_count: 0,
        };
        cart.recompute()?;
        Ok(cart)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn quantity_of(&self, product_id: &str) -> u32 {
        self.items
            .iter()
            .find(|item| item.product_id == product_id)
            .map_or(0, |item| item.quantity)
    }

    /// Adds a line, or bumps the quantity if the product is already in the cart.
    /// The stored snapshot (name, price, image) is refreshed from `item`.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        match self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            Some(existing) => {
                let quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or(CartError::InvalidQuantity)?;
                *existing = CartItem { quantity, ..item };
            }
            None => self.items.push(item),
        }
        self.recompute()
    }

    /// Sets the quantity of a line; zero removes it.
    pub fn update_quantity(&mut self, product_id: &str, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }
        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or_else(|| CartError::ItemNotFound(product_id.to_string()))?;
        item.quantity = quantity;
        self.recompute()
    }

    pub fn remove_item(&mut self, product_id: &str) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before {
            return Err(CartError::ItemNotFound(product_id.to_string()));
        }
        self.recompute()
    }

    pub fn clear(&mut self) -> Result<(), CartError> {
        self.items.clear();
        self.recompute()
    }

    fn recompute(&mut self) -> Result<(), CartError> {
        let subtotal: Money = self.items.iter().map(CartItem::line_total).sum();
        let breakdown = pricing::quote(subtotal)?;
        let item_count = self
            .items
            .iter()
            .try_fold(0u32, |count, i| count.checked_add(i.quantity))
            .ok_or(CartError::InvalidQuantity)?;
        self.subtotal = breakdown.subtotal;
        self.delivery_fee = breakdown.delivery_fee;
        self.total_amount = breakdown.total_amount;
        self.item_count = item_count;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub subtotal: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, price_rupees: i64, quantity: u32) -> CartItem {
        CartItem {
            product_id: id.to_string(),
            product_name: format!("Product {id}"),
            price: Money::rupees(price_rupees),
            quantity,
            category: "vegetables".to_string(),
            product_image: None,
        }
    }

    #[test]
    fn empty_cart_has_zero_totals() {
        let cart = Cart::new("c1", Vec::new()).unwrap();
        assert_eq!(cart.subtotal, Money::ZERO);
        assert_eq!(cart.delivery_fee, Money::ZERO);
        assert_eq!(cart.total_amount, Money::ZERO);
        assert_eq!(cart.item_count, 0);
    }

    #[test]
    fn adding_recomputes_totals() {
        let mut cart = Cart::new("c1", Vec::new()).unwrap();
        cart.add_item(item("tomato", 50, 3)).unwrap();
        assert_eq!(cart.subtotal, Money::rupees(150));
        assert_eq!(cart.delivery_fee, Money::rupees(60));
        assert_eq!(cart.total_amount, Money::rupees(210));
        assert_eq!(cart.item_count, 3);
    }

    #[test]
    fn adding_same_product_merges_lines() {
        let mut cart = Cart::new("c1", vec![item("milk", 60, 1)]).unwrap();
        cart.add_item(item("milk", 60, 2)).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.quantity_of("milk"), 3);
        assert_eq!(cart.subtotal, Money::rupees(180));
    }

    #[test]
    fn crossing_free_delivery_threshold_drops_fee() {
        let mut cart = Cart::new("c1", vec![item("rice", 450, 1)]).unwrap();
        assert_eq!(cart.delivery_fee, Money::rupees(45));
        cart.add_item(item("salt", 50, 1)).unwrap();
        assert_eq!(cart.delivery_fee, Money::ZERO);
        assert_eq!(cart.total_amount, Money::rupees(500));
    }

    #[test]
    fn update_to_zero_removes_line() {
        let mut cart = Cart::new("c1", vec![item("a", 10, 2), item("b", 20, 1)]).unwrap();
        cart.update_quantity("a", 0).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.subtotal, Money::rupees(20));
    }

    #[test]
    fn unknown_lines_are_reported() {
        let mut cart = Cart::new("c1", vec![item("a", 10, 1)]).unwrap();
        assert_eq!(
            cart.update_quantity("zzz", 2),
            Err(CartError::ItemNotFound("zzz".to_string()))
        );
        assert_eq!(cart.remove_item("zzz"), Err(CartError::ItemNotFound("zzz".to_string())));
    }

    #[test]
    fn zero_quantity_add_is_rejected() {
        let mut cart = Cart::new("c1", Vec::new()).unwrap();
        assert_eq!(cart.add_item(item("a", 10, 0)), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn quantity_overflow_is_rejected_and_cart_unchanged() {
        let mut cart = Cart::new("c1", vec![item("a", 1, u32::MAX)]).unwrap();
        let before = cart.clone();
        assert_eq!(cart.add_item(item("a", 1, 1)), Err(CartError::InvalidQuantity));
        assert_eq!(cart, before);

        let mut cart = Cart::new("c1", vec![item("a", 1, u32::MAX)]).unwrap();
        assert_eq!(cart.add_item(item("b", 1, 1)), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn clear_resets_everything() {
        let mut cart = Cart::new("c1", vec![item("a", 10, 5)]).unwrap();
        cart.clear().unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total_amount, Money::ZERO);
    }
}
