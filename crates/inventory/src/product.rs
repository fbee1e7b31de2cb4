//! Product records and the line items that decrement them.

use serde::{Deserialize, Serialize};

use crate::{InventoryError, ProductId, Result};

/// A catalog product as stored in the `products` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: f64,
    /// Units on hand. Never negative.
    pub stock_quantity: i32,
}

/// Attributes of a product that has not been stored yet.
///
/// Storage assigns the identifier on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock_quantity: i32,
}

impl NewProduct {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: f64,
        stock_quantity: i32,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            price,
            stock_quantity,
        }
    }

    /// Checks the attributes before anything is written.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(InventoryError::InvalidProduct(
                "name must not be empty".to_string(),
            ));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(InventoryError::InvalidProduct(format!(
                "price must be a non-negative number, got {}",
                self.price
            )));
        }
        if self.stock_quantity < 0 {
            return Err(InventoryError::InvalidProduct(format!(
                "stock quantity must not be negative, got {}",
                self.stock_quantity
            )));
        }
        Ok(())
    }

    /// Attaches the storage-assigned identifier.
    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            price: self.price,
            stock_quantity: self.stock_quantity,
        }
    }
}

/// One line of an order: take `quantity` units of `product_id` off the shelf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDecrement {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl StockDecrement {
    pub fn new(product_id: impl Into<ProductId>, quantity: i32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_product_passes() {
        let p = NewProduct::new("Widget", "A widget", 9.99, 100);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn zero_stock_is_allowed() {
        assert!(NewProduct::new("Widget", "", 0.0, 0).validate().is_ok());
    }

    #[test]
    fn rejects_negative_stock() {
        let err = NewProduct::new("Widget", "", 1.0, -1).validate().unwrap_err();
        assert!(matches!(err, InventoryError::InvalidProduct(_)));
    }

    #[test]
    fn rejects_bad_price() {
        assert!(NewProduct::new("Widget", "", -0.5, 1).validate().is_err());
        assert!(NewProduct::new("Widget", "", f64::NAN, 1).validate().is_err());
    }

    #[test]
    fn rejects_blank_name() {
        assert!(NewProduct::new("  ", "", 1.0, 1).validate().is_err());
    }

    #[test]
    fn into_product_keeps_attributes() {
        let product = NewProduct::new("Widget", "desc", 9.99, 100).into_product("p1".into());
        assert_eq!(product.id, ProductId::new("p1"));
        assert_eq!(product.stock_quantity, 100);
        assert_eq!(product.name, "Widget");
    }
}
