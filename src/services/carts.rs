use sqlx::SqliteConnection;

use crate::error::AppError;
use crate::models::product::PRODUCT_COLUMNS;
use crate::models::{Cart, CartItem, Product};

pub async fn load(conn: &mut SqliteConnection, customer_uid: &str) -> Result<Cart, AppError> {
    let rows = sqlx::query(
        "SELECT product_id, product_name, price, quantity, category, product_image \
         FROM cart_items WHERE customer_uid = ? ORDER BY position ASC",
    )
    .bind(customer_uid)
    .fetch_all(&mut *conn)
    .await?;

    let items = rows
        .iter()
        .map(CartItem::from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Cart::new(customer_uid, items)?)
}

/// Replaces the stored lines with the cart's current lines, keeping their order.
pub async fn save(conn: &mut SqliteConnection, cart: &Cart) -> Result<(), AppError> {
    sqlx::query("DELETE FROM cart_items WHERE customer_uid = ?")
        .bind(&cart.customer_uid)
        .execute(&mut *conn)
        .await?;

    for (position, item) in cart.items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO cart_items (customer_uid, product_id, product_name, price, quantity, category, product_image, position) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&cart.customer_uid)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.price.paise()?)
        .bind(item.quantity)
        .bind(&item.category)
        .bind(&item.product_image)
        .bind(i64::try_from(position).unwrap_or(i64::MAX))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn find_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> Result<Option<Product>, AppError> {
    let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(Product::from_row).transpose()?)
}
