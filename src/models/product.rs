use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::models::{CartItem, Money};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub seller_uid: String,
    pub name: String,
    pub price: Money,
    pub category: String,
    pub product_image: Option<String>,
    pub stock: u32,
    pub created_at: String,
}

pub(crate) const PRODUCT_COLUMNS: &str =
    "id, seller_uid, name, price, category, product_image, stock, created_at";

impl Product {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Product {
            id: row.try_get("id")?,
            seller_uid: row.try_get("seller_uid")?,
            name: row.try_get("name")?,
            price: Money::from_paise(row.try_get("price")?),
            category: row.try_get("category")?,
            product_image: row.try_get("product_image")?,
            stock: row.try_get("stock")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Cart line for `quantity` units at the current catalog price.
    pub fn to_cart_item(&self, quantity: u32) -> CartItem {
        CartItem {
            product_id: self.id.clone(),
            product_name: self.name.clone(),
            price: self.price,
            quantity,
            category: self.category.clone(),
            product_image: self.product_image.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Money,
    pub category: String,
    pub product_image: Option<String>,
    #[serde(default)]
    pub stock: u32,
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("category is required".to_string());
        }
        if self.price.is_negative() {
            return Err("price cannot be negative".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub category: Option<String>,
    pub product_image: Option<String>,
    pub stock: Option<u32>,
}

impl UpdateProductRequest {
    pub fn apply(self, product: &mut Product) -> Result<(), String> {
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err("name cannot be empty".to_string());
            }
            product.name = name;
        }
        if let Some(price) = self.price {
            if price.is_negative() {
                return Err("price cannot be negative".to_string());
            }
            product.price = price;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if self.product_image.is_some() {
            product.product_image = self.product_image;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        Ok(())
    }
}
