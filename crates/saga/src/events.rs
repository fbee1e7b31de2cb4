//! Message contracts exchanged with the rest of the saga.

use common::{OrderId, ProductId};
use inventory::StockDecrement;
use serde::{Deserialize, Serialize};

/// Announced by the order service when an order is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub total_price: f64,
    #[serde(default)]
    pub items: Vec<OrderLine>,
}

/// One line item of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub quantity: i32,
}

impl OrderCreated {
    /// The stock decrements this order asks for, in line order.
    pub fn decrements(&self) -> Vec<StockDecrement> {
        self.items
            .iter()
            .map(|line| StockDecrement::new(line.product_id.clone(), line.quantity))
            .collect()
    }
}

/// Outcome of a stock update, published once per consumed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdateResult {
    pub order_id: OrderId,
    pub success: bool,
    /// Set only when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StockUpdateResult {
    pub fn succeeded(order_id: OrderId) -> Self {
        Self {
            order_id,
            success: true,
            reason: None,
        }
    }

    pub fn failed(order_id: OrderId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            success: false,
            reason: Some(reason.into()),
        }
    }
}
