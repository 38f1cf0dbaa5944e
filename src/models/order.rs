use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::models::{Money, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wallet,
    Cod,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Cod => "cod",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wallet" => Ok(PaymentMethod::Wallet),
            "cod" => Ok(PaymentMethod::Cod),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    OutForDelivery,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Cancel,
    Pickup,
    Deliver,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Cancel => "cancel",
            OrderAction::Pickup => "pick up",
            OrderAction::Deliver => "deliver",
        }
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn apply(self, action: OrderAction) -> Result<OrderStatus, TransitionError> {
        match (self, action) {
            (OrderStatus::Placed, OrderAction::Cancel) => Ok(OrderStatus::Cancelled),
            (OrderStatus::Placed, OrderAction::Pickup) => Ok(OrderStatus::OutForDelivery),
            (OrderStatus::OutForDelivery, OrderAction::Deliver) => Ok(OrderStatus::Delivered),
            (from, action) => Err(TransitionError::NotAllowed {
                from: from.as_str(),
                action: action.as_str(),
            }),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "out_for_delivery" => Ok(OrderStatus::OutForDelivery),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub seller_uid: String,
    pub product_name: String,
    pub price: Money,
    pub quantity: u32,
    pub category: String,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.price.times(self.quantity)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer_uid: String,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub delivery_address: String,
    pub delivery_partner_uid: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub(crate) const ORDER_COLUMNS: &str = "id, customer_uid, items, subtotal, delivery_fee, total_amount, payment_method, status, delivery_address, delivery_partner_uid, created_at, updated_at";

impl Order {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let decode = |e: String| sqlx::Error::Decode(e.into());
        let items: String = row.try_get("items")?;
        let payment_method: String = row.try_get("payment_method")?;
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: row.try_get("id")?,
            customer_uid: row.try_get("customer_uid")?,
            items: serde_json::from_str(&items).map_err(|e| sqlx::Error::Decode(e.into()))?,
            subtotal: Money::from_paise(row.try_get("subtotal")?),
            delivery_fee: Money::from_paise(row.try_get("delivery_fee")?),
            total_amount: Money::from_paise(row.try_get("total_amount")?),
            payment_method: payment_method.parse().map_err(decode)?,
            status: status.parse().map_err(decode)?,
            delivery_address: row.try_get("delivery_address")?,
            delivery_partner_uid: row.try_get("delivery_partner_uid")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Amount owed to each seller once the order is delivered.
    pub fn seller_payouts(&self) -> Vec<(String, Money)> {
        let mut payouts: Vec<(String, Money)> = Vec::new();
        for item in &self.items {
            match payouts.iter_mut().find(|(uid, _)| *uid == item.seller_uid) {
                Some((_, total)) => *total += item.line_total(),
                None => payouts.push((item.seller_uid.clone(), item.line_total())),
            }
        }
        payouts
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub payment_method: PaymentMethod,
    pub delivery_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle() {
        let status = OrderStatus::Placed.apply(OrderAction::Pickup).unwrap();
        assert_eq!(status, OrderStatus::OutForDelivery);
        assert_eq!(status.apply(OrderAction::Deliver).unwrap(), OrderStatus::Delivered);
    }

    #[test]
    fn only_placed_orders_can_be_cancelled() {
        assert_eq!(OrderStatus::Placed.apply(OrderAction::Cancel).unwrap(), OrderStatus::Cancelled);
        assert!(OrderStatus::OutForDelivery.apply(OrderAction::Cancel).is_err());
        assert!(OrderStatus::Delivered.apply(OrderAction::Cancel).is_err());
    }

    #[test]
    fn cannot_deliver_before_pickup() {
        assert_eq!(
            OrderStatus::Placed.apply(OrderAction::Deliver),
            Err(TransitionError::NotAllowed { from: "placed", action: "deliver" })
        );
    }

    #[test]
    fn payouts_are_grouped_by_seller() {
        let item = |seller: &str, paise: i64, quantity: u32| OrderItem {
            product_id: format!("p-{seller}-{paise}"),
            seller_uid: seller.to_string(),
            product_name: "thing".to_string(),
            price: Money::from_paise(paise),
            quantity,
            category: "misc".to_string(),
        };
        let order = Order {
            id: "o1".into(),
            customer_uid: "c1".into(),
            items: vec![item("s1", 100_00, 2), item("s2", 50_00, 1), item("s1", 25_00, 1)],
            subtotal: Money::rupees(275),
            delivery_fee: Money::rupees(55),
            total_amount: Money::rupees(330),
            payment_method: PaymentMethod::Cod,
            status: OrderStatus::OutForDelivery,
            delivery_address: "12 MG Road".into(),
            delivery_partner_uid: Some("d1".into()),
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(
            order.seller_payouts(),
            vec![("s1".to_string(), Money::rupees(225)), ("s2".to_string(), Money::rupees(50))]
        );
    }
}
