use serde::{Deserialize, Serialize};

/// Prefix of every product snapshot key in the cache.
pub const PRODUCT_CACHE_PREFIX: &str = "product:";

/// Identifier of a product row.
///
/// Opaque to this service: storage assigns it on creation and callers
/// hand it back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the cache key holding this product's snapshot.
    pub fn cache_key(&self) -> String {
        format!("{PRODUCT_CACHE_PREFIX}{}", self.0)
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<ProductId> for String {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of an order, assigned by the order service upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_uses_product_prefix() {
        let id = ProductId::new("p1");
        assert_eq!(id.cache_key(), "product:p1");
    }

    #[test]
    fn product_id_serializes_as_plain_string() {
        let id = ProductId::new("9b2c");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"9b2c\"");
    }

    #[test]
    fn order_id_deserializes_from_plain_string() {
        let id: OrderId = serde_json::from_str("\"o1\"").unwrap();
        assert_eq!(id, OrderId::from("o1"));
        assert_eq!(id.to_string(), "o1");
    }
}
